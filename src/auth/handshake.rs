//! Twitter sign-in handshake
//!
//! Two legs of OAuth 1.0a, bound to the browser session:
//!
//! ```text
//! Anonymous --initiate_login--> PendingVerification --complete_login--> Authenticated
//! ```
//!
//! A callback is only accepted when the `oauth_token` it carries is the
//! request token this same session stored in `initiate_login`.
//! Validation failures leave the session untouched.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::session::{PendingAuthRequest, Session};
use crate::data::User;
use crate::error::AppError;
use crate::metrics::{LOGIN_STEPS_TOTAL, observe_provider_call};

#[cfg(test)]
use mockall::automock;

/// Request token issued by the provider for a new handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub token_secret: String,
    /// Where the browser is sent to approve the request
    pub authorize_url: String,
}

/// Long-lived credential obtained after verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredential {
    pub token: String,
    pub secret: String,
}

/// Profile of the authenticated provider account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider_user_id: String,
    pub screen_name: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Query parameters the provider appends to the callback URL
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub oauth_verifier: Option<String>,
    pub oauth_token: Option<String>,
}

/// OAuth provider operations used by the handshake
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Obtain a request token and the authorization URL for it
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, AppError>;

    /// Exchange a verified request token for an access credential
    async fn exchange_token(
        &self,
        request: &PendingAuthRequest,
        verifier: &str,
    ) -> Result<AccessCredential, AppError>;

    /// Read the profile of the account behind `credential`
    async fn fetch_profile(
        &self,
        credential: &AccessCredential,
    ) -> Result<ExternalIdentity, AppError>;
}

/// Maps provider identities to internal users
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserResolver: Send + Sync {
    /// Find the user for `identity`, creating one if absent
    async fn find_or_create(
        &self,
        identity: &ExternalIdentity,
        credential: &AccessCredential,
    ) -> Result<User, AppError>;
}

/// Result of a handshake step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Session was already logged in; nothing changed
    AlreadyAuthenticated,
    /// Session now holds a pending request; send the browser here
    RedirectToProvider(String),
    /// Session is now bound to this user
    LoggedIn { user_id: String },
}

impl HandshakeStep {
    /// Whether the session changed and must be persisted
    pub fn session_changed(&self) -> bool {
        !matches!(self, HandshakeStep::AlreadyAuthenticated)
    }

    /// Where the browser goes next
    pub fn location(&self) -> &str {
        match self {
            HandshakeStep::RedirectToProvider(url) => url,
            HandshakeStep::AlreadyAuthenticated | HandshakeStep::LoggedIn { .. } => "/",
        }
    }
}

/// Drives the sign-in handshake
///
/// Collaborators are injected at construction; the controller holds no
/// per-request state.
#[derive(Clone)]
pub struct HandshakeController {
    provider: Arc<dyn ProviderClient>,
    users: Arc<dyn UserResolver>,
}

impl HandshakeController {
    pub fn new(provider: Arc<dyn ProviderClient>, users: Arc<dyn UserResolver>) -> Self {
        Self { provider, users }
    }

    /// First leg: obtain a request token and remember it in the session
    ///
    /// The caller persists the session before redirecting.
    pub async fn initiate_login(
        &self,
        session: &mut Session,
        callback_url: &str,
    ) -> Result<HandshakeStep, AppError> {
        if session.is_authenticated() {
            LOGIN_STEPS_TOTAL
                .with_label_values(&["initiate", "already_authenticated"])
                .inc();
            return Ok(HandshakeStep::AlreadyAuthenticated);
        }

        let started = Instant::now();
        let result = self.provider.request_token(callback_url).await;
        observe_provider_call("request_token", result.is_ok(), started.elapsed());
        let request_token = result.inspect_err(|_| {
            LOGIN_STEPS_TOTAL
                .with_label_values(&["initiate", "provider_error"])
                .inc();
        })?;

        session.pending_auth = Some(PendingAuthRequest {
            token: request_token.token,
            token_secret: request_token.token_secret,
        });

        LOGIN_STEPS_TOTAL
            .with_label_values(&["initiate", "redirected"])
            .inc();
        Ok(HandshakeStep::RedirectToProvider(
            request_token.authorize_url,
        ))
    }

    /// Second leg: verify the callback, exchange the token, bind the user
    ///
    /// On error the session is left as it was. The caller persists the
    /// session when the returned step reports a change.
    pub async fn complete_login(
        &self,
        session: &mut Session,
        params: &CallbackParams,
    ) -> Result<HandshakeStep, AppError> {
        if session.is_authenticated() {
            LOGIN_STEPS_TOTAL
                .with_label_values(&["complete", "already_authenticated"])
                .inc();
            return Ok(HandshakeStep::AlreadyAuthenticated);
        }

        let pending = validate_callback(session.pending_auth.as_ref(), params)
            .inspect_err(|error| {
                LOGIN_STEPS_TOTAL
                    .with_label_values(&["complete", error.error_type()])
                    .inc();
            })?;
        let verifier = params.oauth_verifier.as_deref().unwrap_or_default();

        let user = self.finish(pending, verifier).await.inspect_err(|_| {
            LOGIN_STEPS_TOTAL
                .with_label_values(&["complete", "fatal"])
                .inc();
        })?;

        tracing::info!(
            user_id = %user.id,
            screen_name = %user.screen_name,
            "User signed in"
        );
        session.login(user.id.clone());

        LOGIN_STEPS_TOTAL
            .with_label_values(&["complete", "logged_in"])
            .inc();
        Ok(HandshakeStep::LoggedIn { user_id: user.id })
    }

    async fn finish(&self, pending: &PendingAuthRequest, verifier: &str) -> Result<User, AppError> {
        let started = Instant::now();
        let result = self.provider.exchange_token(pending, verifier).await;
        observe_provider_call("exchange_token", result.is_ok(), started.elapsed());
        let credential = result?;

        let started = Instant::now();
        let result = self.provider.fetch_profile(&credential).await;
        observe_provider_call("fetch_profile", result.is_ok(), started.elapsed());
        let identity = result?;

        self.users.find_or_create(&identity, &credential).await
    }
}

/// Checks the callback against the pending request, in order:
/// pending request, verifier, token, token equality
fn validate_callback<'a>(
    pending: Option<&'a PendingAuthRequest>,
    params: &CallbackParams,
) -> Result<&'a PendingAuthRequest, AppError> {
    let pending = pending.ok_or(AppError::NoPendingToken)?;

    if params.oauth_verifier.as_deref().unwrap_or_default().is_empty() {
        return Err(AppError::MissingVerifier);
    }

    let returned = params.oauth_token.as_deref().unwrap_or_default();
    if returned.is_empty() {
        return Err(AppError::MissingToken);
    }

    if !bool::from(returned.as_bytes().ct_eq(pending.token.as_bytes())) {
        return Err(AppError::TokenMismatch);
    }

    Ok(pending)
}
