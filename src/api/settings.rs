//! Settings endpoints
//!
//! Every route requires a signed-in user. Form submissions always answer
//! with a redirect to `/settings`; problems are reported through the
//! `settings_error` flash and read back by `GET /settings`.

use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;
use crate::api::found;
use crate::auth::CurrentUser;
use crate::auth::session::{FLASH_SETTINGS_ERROR, FLASH_SETTINGS_SUCCESS};
use crate::error::AppError;
use crate::service::{MSG_FORM_PARSE, MSG_UPDATED, SettingsForm, SettingsOutcome, SettingsView};

const SETTINGS_PATH: &str = "/settings";

pub fn settings_router() -> Router<AppState> {
    Router::new()
        .route(SETTINGS_PATH, get(show_settings).post(update_settings))
        .route("/settings/tweets/enable", post(enable_tweets))
        .route("/settings/tweets/disable", post(disable_tweets))
}

/// Settings page payload
#[derive(Debug, Serialize)]
struct SettingsPage {
    #[serde(flatten)]
    view: SettingsView,
    settings_error: Vec<String>,
    settings_success: Vec<String>,
}

/// GET /settings
///
/// Consumes pending flash messages.
async fn show_settings(
    State(state): State<AppState>,
    CurrentUser { user, mut session }: CurrentUser,
) -> Result<Response, AppError> {
    let settings_error = session.session.take_flashes(FLASH_SETTINGS_ERROR);
    let settings_success = session.session.take_flashes(FLASH_SETTINGS_SUCCESS);
    let view = state.settings.view(user).await?;
    let jar = session.save()?;

    Ok((
        jar,
        Json(SettingsPage {
            view,
            settings_error,
            settings_success,
        }),
    )
        .into_response())
}

/// POST /settings/tweets/enable
async fn enable_tweets(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
) -> Result<Response, AppError> {
    state.settings.set_tweets_enabled(&user, true).await?;
    Ok(found(SETTINGS_PATH))
}

/// POST /settings/tweets/disable
async fn disable_tweets(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
) -> Result<Response, AppError> {
    state.settings.set_tweets_enabled(&user, false).await?;
    Ok(found(SETTINGS_PATH))
}

/// POST /settings
///
/// Form fields: `osu_username`, `game_mode`.
async fn update_settings(
    State(state): State<AppState>,
    CurrentUser { user, mut session }: CurrentUser,
    form: Result<Form<SettingsForm>, FormRejection>,
) -> Result<Response, AppError> {
    let outcome = match form {
        Ok(Form(form)) => state.settings.update_osu_account(&user, &form).await,
        Err(_) if !user.tweets_enabled => SettingsOutcome::TweetsDisabled,
        Err(rejection) => {
            tracing::warn!(%rejection, user_id = %user.id, "Settings form rejected");
            SettingsOutcome::Rejected(MSG_FORM_PARSE)
        }
    };

    match outcome {
        SettingsOutcome::TweetsDisabled => return Ok(found(SETTINGS_PATH)),
        SettingsOutcome::Rejected(message) => {
            session.session.add_flash(FLASH_SETTINGS_ERROR, message);
        }
        SettingsOutcome::Updated(_) => {
            session.session.add_flash(FLASH_SETTINGS_SUCCESS, MSG_UPDATED);
        }
    }

    let jar = session.save()?;
    Ok((jar, found(SETTINGS_PATH)).into_response())
}
