//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Game modes
// =============================================================================

/// osu! game mode, numbered as the osu! API `m` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Standard,
    Taiko,
    Catch,
    Mania,
}

impl GameMode {
    pub const ALL: [GameMode; 4] = [
        GameMode::Standard,
        GameMode::Taiko,
        GameMode::Catch,
        GameMode::Mania,
    ];

    pub fn as_i64(self) -> i64 {
        match self {
            GameMode::Standard => 0,
            GameMode::Taiko => 1,
            GameMode::Catch => 2,
            GameMode::Mania => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(GameMode::Standard),
            1 => Some(GameMode::Taiko),
            2 => Some(GameMode::Catch),
            3 => Some(GameMode::Mania),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            GameMode::Standard => "osu!standard",
            GameMode::Taiko => "osu!taiko",
            GameMode::Catch => "osu!catch",
            GameMode::Mania => "osu!mania",
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A Twitter-authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    /// Twitter numeric user ID (as string)
    pub twitter_id: String,
    pub screen_name: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub access_token_secret: String,
    /// Whether statistics tweets are posted for this user
    pub tweets_enabled: bool,
    /// Linked osu! player (osu_players.id)
    pub osu_player_id: Option<String>,
    /// Raw mode number, see [`GameMode`]
    pub osu_mode: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn game_mode(&self) -> GameMode {
        GameMode::from_i64(self.osu_mode).unwrap_or(GameMode::Standard)
    }
}

// =============================================================================
// osu! players and statistics
// =============================================================================

/// An osu! player we have fetched statistics for
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OsuPlayer {
    pub id: String,
    /// osu! numeric user ID
    pub osu_user_id: i64,
    pub player_name: String,
    pub last_checked: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One recorded copy of a player's statistics in a mode
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OsuStatsSnapshot {
    pub id: String,
    pub osu_player_id: String,
    pub mode: i64,
    pub checked_at: DateTime<Utc>,
    pub count_50: i64,
    pub count_100: i64,
    pub count_300: i64,
    pub count_ss: i64,
    pub count_s: i64,
    pub count_a: i64,
    pub play_count: i64,
    pub ranked_score: i64,
    pub total_score: i64,
    pub pp_raw: f64,
    pub pp_rank: i64,
    pub pp_country_rank: i64,
    pub country: String,
    pub level: f64,
    pub accuracy: f64,
}
