//! osu! API v1 HTTP client

use async_trait::async_trait;

use super::{OsuApi, OsuUserStats};
use crate::data::GameMode;
use crate::error::AppError;
use crate::metrics::OSU_API_REQUESTS_TOTAL;

/// reqwest-backed [`OsuApi`]
#[derive(Clone)]
pub struct OsuClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OsuClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl OsuApi for OsuClient {
    async fn get_user(
        &self,
        username: &str,
        mode: GameMode,
    ) -> Result<Option<OsuUserStats>, AppError> {
        let mode = mode.as_i64().to_string();
        let response = self
            .http
            .get(format!("{}/get_user", self.base_url))
            .query(&[
                ("k", self.api_key.as_str()),
                ("u", username),
                ("m", mode.as_str()),
                ("type", "string"),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            // The request URL carries the API key.
            .map_err(reqwest::Error::without_url)
            .inspect_err(|error| {
                OSU_API_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!(%error, username, "osu! API request failed");
            })?;

        let mut users: Vec<OsuUserStats> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .inspect_err(|_| {
                OSU_API_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            })?;
        OSU_API_REQUESTS_TOTAL.with_label_values(&["success"]).inc();

        if users.is_empty() {
            tracing::debug!(username, "osu! player not found");
            return Ok(None);
        }
        Ok(Some(users.swap_remove(0)))
    }
}
