//! Settings service
//!
//! Tweet posting toggle and osu! player linking for the signed-in user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{Database, GameMode, LinkedPlayer, OsuStatsSnapshot, User};
use crate::error::AppError;
use crate::osu::OsuApi;

pub const MSG_FORM_PARSE: &str = "Error parsing form";
pub const MSG_INVALID_MODE: &str = "Invalid mode";
pub const MSG_INVALID_USERNAME: &str = "Invalid osu! username";
pub const MSG_LOOKUP_FAILED: &str = "Error getting user information";
pub const MSG_SAVE_FAILED: &str = "Error saving settings";
pub const MSG_UPDATED: &str = "Settings updated";

/// Fields posted by the settings form
///
/// Kept as raw strings so a bad `game_mode` is reported as an invalid mode
/// rather than a form parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub osu_username: String,
    #[serde(default)]
    pub game_mode: String,
}

/// What happened to a settings update
#[derive(Debug)]
pub enum SettingsOutcome {
    /// Tweet posting is off; nothing was looked at
    TweetsDisabled,
    /// Rejected with a message for the `settings_error` flash
    Rejected(&'static str),
    /// Player linked and a snapshot recorded
    Updated(LinkedPlayer),
}

/// Game mode entry offered by the settings page
#[derive(Debug, Clone, Serialize)]
pub struct ModeOption {
    pub value: i64,
    pub name: &'static str,
}

/// Linked osu! player summary
#[derive(Debug, Clone, Serialize)]
pub struct LinkedPlayerView {
    pub osu_user_id: i64,
    pub player_name: String,
    pub mode: i64,
    pub mode_name: &'static str,
    /// Most recent snapshot for the selected mode, if any
    pub latest: Option<OsuStatsSnapshot>,
}

/// Data backing the settings page
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub user: User,
    pub osu_player: Option<LinkedPlayerView>,
    pub modes: Vec<ModeOption>,
}

/// Settings service
pub struct SettingsService {
    db: Arc<Database>,
    osu: Arc<dyn OsuApi>,
}

impl SettingsService {
    pub fn new(db: Arc<Database>, osu: Arc<dyn OsuApi>) -> Self {
        Self { db, osu }
    }

    /// Assemble the settings page for `user`
    pub async fn view(&self, user: User) -> Result<SettingsView, AppError> {
        let osu_player = match user.osu_player_id.as_deref() {
            Some(player_id) => {
                let player = self
                    .db
                    .get_osu_player(player_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                let mode = user.game_mode();
                let latest = self.db.latest_snapshot(&player.id, mode).await?;
                Some(LinkedPlayerView {
                    osu_user_id: player.osu_user_id,
                    player_name: player.player_name,
                    mode: mode.as_i64(),
                    mode_name: mode.display_name(),
                    latest,
                })
            }
            None => None,
        };

        Ok(SettingsView {
            user,
            osu_player,
            modes: GameMode::ALL
                .iter()
                .map(|mode| ModeOption {
                    value: mode.as_i64(),
                    name: mode.display_name(),
                })
                .collect(),
        })
    }

    /// Turn tweet posting on or off; a no-op if already in that state
    pub async fn set_tweets_enabled(&self, user: &User, enabled: bool) -> Result<(), AppError> {
        if self.db.set_tweets_enabled(&user.id, enabled).await? {
            tracing::info!(user_id = %user.id, enabled, "Tweet posting toggled");
        }
        Ok(())
    }

    /// Validate the form, look the player up and link it
    ///
    /// Checks run in order: tweets enabled, mode, username, osu! lookup,
    /// database update. The first failure wins.
    pub async fn update_osu_account(&self, user: &User, form: &SettingsForm) -> SettingsOutcome {
        if !user.tweets_enabled {
            return SettingsOutcome::TweetsDisabled;
        }

        let Some(mode) = parse_mode(&form.game_mode) else {
            return SettingsOutcome::Rejected(MSG_INVALID_MODE);
        };

        let username = form.osu_username.trim();
        if username.is_empty() {
            return SettingsOutcome::Rejected(MSG_INVALID_USERNAME);
        }

        let stats = match self.osu.get_user(username, mode).await {
            Ok(Some(stats)) => stats,
            Ok(None) => {
                tracing::info!(username, "osu! player not found");
                return SettingsOutcome::Rejected(MSG_LOOKUP_FAILED);
            }
            Err(error) => {
                tracing::error!(%error, username, "osu! lookup failed");
                return SettingsOutcome::Rejected(MSG_LOOKUP_FAILED);
            }
        };

        match self.db.link_osu_player(&user.id, &stats, mode).await {
            Ok(linked) => SettingsOutcome::Updated(linked),
            Err(error) => {
                tracing::error!(%error, user_id = %user.id, "Saving settings failed");
                SettingsOutcome::Rejected(MSG_SAVE_FAILED)
            }
        }
    }
}

fn parse_mode(raw: &str) -> Option<GameMode> {
    raw.trim().parse::<i64>().ok().and_then(GameMode::from_i64)
}
