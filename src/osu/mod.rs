//! osu! API access
//!
//! Only the v1 `get_user` endpoint is used: it returns the statistics we
//! snapshot when a player is linked.

mod client;

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::data::GameMode;
use crate::error::AppError;

pub use client::OsuClient;

#[cfg(test)]
use mockall::automock;

/// Player statistics for one game mode
///
/// The v1 API encodes numbers as strings and uses `null` for players
/// without plays in a mode; statistics parse to zero in both cases. The
/// player ID keys stored players, so it must be present and positive.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsuUserStats {
    #[serde(deserialize_with = "player_id")]
    pub user_id: i64,
    pub username: String,
    #[serde(default, deserialize_with = "lenient")]
    pub count50: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub count100: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub count300: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub playcount: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub ranked_score: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub total_score: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub pp_rank: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub level: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub pp_raw: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub accuracy: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub count_rank_ss: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub count_rank_ssh: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub count_rank_s: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub count_rank_sh: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub count_rank_a: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient")]
    pub pp_country_rank: i64,
}

impl OsuUserStats {
    /// SS ranks, silver included
    pub fn ss_count(&self) -> i64 {
        self.count_rank_ss + self.count_rank_ssh
    }

    /// S ranks, silver included
    pub fn s_count(&self) -> i64 {
        self.count_rank_s + self.count_rank_sh
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(raw)) => raw.trim().parse().unwrap_or_default(),
        Some(serde_json::Value::Number(number)) => number.to_string().parse().unwrap_or_default(),
        _ => T::default(),
    })
}

fn player_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let id = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(raw) => raw.trim().parse::<i64>().ok(),
        serde_json::Value::Number(number) => number.as_i64(),
        _ => None,
    };
    id.filter(|id| *id > 0)
        .ok_or_else(|| serde::de::Error::custom("invalid osu! user_id"))
}

/// osu! statistics lookup
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OsuApi: Send + Sync {
    /// Fetch `username`'s statistics in `mode`; `None` if no such player
    async fn get_user(
        &self,
        username: &str,
        mode: GameMode,
    ) -> Result<Option<OsuUserStats>, AppError>;
}
