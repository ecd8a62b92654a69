//! Error types for osutweet
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Errors fall in two tiers:
//! - user errors (400): the browser sent something we cannot act on and
//!   the user has to restart the flow
//! - fatal errors (500): a collaborator (provider, database, session
//!   store) failed; details are logged, the page stays generic

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Callback arrived without a pending request token in the session (400)
    #[error("No token detected in your session")]
    NoPendingToken,

    /// Callback is missing `oauth_verifier` (400)
    #[error("No oauth_verifier returned in callback")]
    MissingVerifier,

    /// Callback is missing `oauth_token` (400)
    #[error("No oauth_token returned in callback")]
    MissingToken,

    /// Callback token differs from the one this session started with (400)
    #[error("Twitter oauth_token mismatch")]
    TokenMismatch,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// OAuth provider failure (500)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Session could not be read or persisted (500)
    #[error("Session error: {0}")]
    Session(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (500)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NoPendingToken
            | AppError::MissingVerifier
            | AppError::MissingToken
            | AppError::TokenMismatch
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Provider(_)
            | AppError::Session(_)
            | AppError::Database(_)
            | AppError::HttpClient(_)
            | AppError::Config(_)
            | AppError::Encryption(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was caused by the request rather than a collaborator
    pub fn is_user_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Short label used for metrics and log fields
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::NoPendingToken => "no_pending_token",
            AppError::MissingVerifier => "missing_verifier",
            AppError::MissingToken => "missing_token",
            AppError::TokenMismatch => "token_mismatch",
            AppError::Validation(_) => "validation",
            AppError::Provider(_) => "provider",
            AppError::Session(_) => "session",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }

    /// Message that is safe to show to the browser
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound
            | AppError::NoPendingToken
            | AppError::MissingVerifier
            | AppError::MissingToken
            | AppError::TokenMismatch => self.to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Provider(_) | AppError::HttpClient(_) => {
                "Error communicating with Twitter".to_string()
            }
            AppError::Session(_) => "Error handling your session".to_string(),
            AppError::Database(_) => "Database error".to_string(),
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Marker attached to error responses
///
/// The error page layer in [`crate::api::render_error_page`] turns it into
/// an HTML page carrying the request correlation ID.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.error_type();

        if self.is_user_error() {
            tracing::warn!(error = %self, error_type, "Request rejected");
        } else {
            tracing::error!(error = %self, error_type, "Request failed");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let message = self.public_message();
        let mut response = (status, message.clone()).into_response();
        response
            .extensions_mut()
            .insert(ErrorPage { status, message });
        response
    }
}
