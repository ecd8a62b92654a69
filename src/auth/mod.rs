//! Twitter authentication
//!
//! Handles:
//! - OAuth 1.0a sign-in handshake
//! - Session management
//! - Authentication extractors

mod handshake;
mod middleware;
mod routes;
pub mod session;

pub use handshake::{
    AccessCredential, CallbackParams, ExternalIdentity, HandshakeController, HandshakeStep,
    ProviderClient, RequestToken, UserResolver,
};
pub use middleware::{CurrentUser, LOGIN_PATH, SessionContext};
pub use routes::auth_router;
pub use session::{CookieSessionStore, Session};
