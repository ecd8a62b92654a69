//! Twitter sign-in routes
//!
//! The handlers only move the session between the cookie and the
//! [`HandshakeController`](super::HandshakeController); all checks live
//! there.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use super::handshake::{CallbackParams, HandshakeStep};
use super::middleware::SessionContext;
use crate::AppState;
use crate::api::found;
use crate::error::AppError;

/// Create authentication router
///
/// Routes:
/// - GET /connect/twitter - Start the handshake
/// - GET /connect/twitter/callback - Provider callback
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/connect/twitter", get(connect_twitter))
        .route("/connect/twitter/callback", get(twitter_callback))
        .route("/logout", post(logout))
}

/// GET /connect/twitter
///
/// # Steps
/// 1. Skip to home if the session is already signed in
/// 2. Obtain a request token, store it in the session
/// 3. Redirect to Twitter's authorization page
async fn connect_twitter(
    State(state): State<AppState>,
    mut context: SessionContext,
) -> Result<Response, AppError> {
    let callback_url = state.config.server.twitter_callback_url();
    let step = state
        .handshake
        .initiate_login(&mut context.session, &callback_url)
        .await?;
    respond(context, step)
}

/// GET /connect/twitter/callback
///
/// # Steps
/// 1. Check the returned token against the one stored in the session
/// 2. Exchange it for an access token and load the profile
/// 3. Find or create the user, mark the session signed in
/// 4. Redirect to home
async fn twitter_callback(
    State(state): State<AppState>,
    mut context: SessionContext,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let step = state
        .handshake
        .complete_login(&mut context.session, &params)
        .await?;
    respond(context, step)
}

/// POST /logout
async fn logout(context: SessionContext) -> Response {
    if let Some(user_id) = context.session.user_id.as_deref() {
        tracing::info!(user_id, "User signed out");
    }
    (context.clear(), found("/")).into_response()
}

fn respond(context: SessionContext, step: HandshakeStep) -> Result<Response, AppError> {
    let location = step.location().to_string();
    if !step.session_changed() {
        return Ok(found(&location));
    }

    let jar = context.save()?;
    Ok((jar, found(&location)).into_response())
}
