//! Twitter OAuth 1.0a client
//!
//! Implements [`ProviderClient`] against the Twitter endpoints:
//! - POST oauth/request_token
//! - GET  oauth/authenticate (browser redirect)
//! - POST oauth/access_token
//! - GET  account/verify_credentials.json

pub mod signature;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::{AccessCredential, ExternalIdentity, ProviderClient, RequestToken};
use crate::auth::session::PendingAuthRequest;
use crate::config::TwitterConfig;
use crate::error::AppError;
use signature::{Signer, generate_nonce};

/// Error bodies are truncated to this many bytes in logs
const MAX_ERROR_BODY: usize = 512;

/// reqwest-backed Twitter client
#[derive(Clone)]
pub struct TwitterClient {
    http: reqwest::Client,
    consumer_key: String,
    consumer_secret: String,
    oauth_base_url: String,
    api_base_url: String,
}

/// Subset of the verify_credentials response we keep
#[derive(Debug, Deserialize)]
struct TwitterUser {
    id_str: String,
    screen_name: String,
    name: String,
    profile_image_url_https: Option<String>,
}

impl TwitterClient {
    pub fn new(http: reqwest::Client, config: &TwitterConfig) -> Self {
        Self {
            http,
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            oauth_base_url: config.oauth_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn signer<'a>(&'a self, token: Option<&'a str>, token_secret: &'a str) -> Signer<'a> {
        Signer {
            consumer_key: &self.consumer_key,
            consumer_secret: &self.consumer_secret,
            token,
            token_secret,
        }
    }

    /// Send a signed POST to an OAuth endpoint and parse the form-encoded reply
    async fn post_oauth(
        &self,
        operation: &str,
        signer: Signer<'_>,
        oauth_extra: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, AppError> {
        let url = format!("{}/{}", self.oauth_base_url, operation);
        let header = signer.authorization_header(
            "POST",
            &url,
            &[],
            oauth_extra,
            &generate_nonce(),
            chrono::Utc::now().timestamp(),
        )?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await
            .map_err(|e| provider_error(operation, e))?;
        let body = read_success_body(operation, response).await?;

        Ok(url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect())
    }
}

#[async_trait]
impl ProviderClient for TwitterClient {
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, AppError> {
        let reply = self
            .post_oauth(
                "request_token",
                self.signer(None, ""),
                &[("oauth_callback", callback_url)],
            )
            .await?;

        if reply.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(AppError::Provider(
                "request_token: callback was not confirmed".to_string(),
            ));
        }

        let token = required_field(&reply, "request_token", "oauth_token")?;
        let token_secret = required_field(&reply, "request_token", "oauth_token_secret")?;
        let authorize_url = format!(
            "{}/authenticate?oauth_token={}",
            self.oauth_base_url,
            urlencoding::encode(&token)
        );

        Ok(RequestToken {
            token,
            token_secret,
            authorize_url,
        })
    }

    async fn exchange_token(
        &self,
        request: &PendingAuthRequest,
        verifier: &str,
    ) -> Result<AccessCredential, AppError> {
        let reply = self
            .post_oauth(
                "access_token",
                self.signer(Some(&request.token), &request.token_secret),
                &[("oauth_verifier", verifier)],
            )
            .await?;

        Ok(AccessCredential {
            token: required_field(&reply, "access_token", "oauth_token")?,
            secret: required_field(&reply, "access_token", "oauth_token_secret")?,
        })
    }

    async fn fetch_profile(
        &self,
        credential: &AccessCredential,
    ) -> Result<ExternalIdentity, AppError> {
        const OPERATION: &str = "verify_credentials";

        let url = format!("{}/account/verify_credentials.json", self.api_base_url);
        let query = [("skip_status", "true")];
        let header = self
            .signer(Some(&credential.token), &credential.secret)
            .authorization_header(
                "GET",
                &url,
                &query,
                &[],
                &generate_nonce(),
                chrono::Utc::now().timestamp(),
            )?;

        let response = self
            .http
            .get(&url)
            .query(&query)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await
            .map_err(|e| provider_error(OPERATION, e))?;
        let body = read_success_body(OPERATION, response).await?;

        let user: TwitterUser = serde_json::from_str(&body)
            .map_err(|e| AppError::Provider(format!("{OPERATION}: invalid response: {e}")))?;

        Ok(ExternalIdentity {
            provider_user_id: user.id_str,
            screen_name: user.screen_name,
            display_name: user.name,
            avatar_url: user.profile_image_url_https,
        })
    }
}

fn provider_error(operation: &str, error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::Provider(format!("{operation}: timed out"))
    } else {
        AppError::Provider(format!("{operation}: {error}"))
    }
}

async fn read_success_body(operation: &str, response: reqwest::Response) -> Result<String, AppError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| provider_error(operation, e))?;

    if !status.is_success() {
        let mut end = body.len().min(MAX_ERROR_BODY);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        return Err(AppError::Provider(format!(
            "{operation}: HTTP {status}: {}",
            &body[..end]
        )));
    }

    Ok(body)
}

fn required_field(
    reply: &HashMap<String, String>,
    operation: &str,
    field: &str,
) -> Result<String, AppError> {
    reply
        .get(field)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| AppError::Provider(format!("{operation}: response is missing {field}")))
}
