//! Request extractors for session state
//!
//! - [`SessionContext`]: the browser session, loaded from the signed cookie
//! - [`CurrentUser`]: the signed-in user; anonymous requests are sent to
//!   the Twitter login

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use super::session::{CookieSessionStore, Session};
use crate::AppState;
use crate::api::found;
use crate::data::User;
use crate::error::AppError;

/// Where anonymous visitors of protected pages are sent
pub const LOGIN_PATH: &str = "/connect/twitter";

/// The request's session plus what is needed to write it back
///
/// Loading never fails; a missing, tampered or expired cookie gives a fresh
/// anonymous session. Handlers that mutate the session call [`save`] and
/// return the jar with their response.
///
/// [`save`]: SessionContext::save
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session: Session,
    jar: CookieJar,
    store: CookieSessionStore,
}

impl SessionContext {
    pub fn new(store: CookieSessionStore, jar: CookieJar) -> Self {
        let session = store.load(&jar);
        Self {
            session,
            jar,
            store,
        }
    }

    /// Persist the session, producing the `Set-Cookie`
    pub fn save(self) -> Result<CookieJar, AppError> {
        self.store.persist(&self.session, self.jar)
    }

    /// Drop the session cookie entirely
    pub fn clear(self) -> CookieJar {
        self.store.clear(self.jar)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(SessionContext::new(state.sessions.clone(), jar))
    }
}

/// Extractor for the signed-in user
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser { user, .. }: CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.screen_name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: SessionContext,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    /// Unauthenticated requests redirect to the login. A session pointing at
    /// a user that no longer exists is reset first.
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let mut context = SessionContext::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        let Some(user_id) = context
            .session
            .is_authenticated()
            .then(|| context.session.user_id.clone())
            .flatten()
        else {
            return Err(found(LOGIN_PATH));
        };

        match app_state.db.get_user(&user_id).await {
            Ok(Some(user)) => Ok(CurrentUser {
                user,
                session: context,
            }),
            Ok(None) => {
                tracing::warn!(user_id, "Session refers to a missing user; resetting");
                context.session.logout();
                let jar = context.save().map_err(IntoResponse::into_response)?;
                Err((jar, found(LOGIN_PATH)).into_response())
            }
            Err(error) => Err(error.into_response()),
        }
    }
}
