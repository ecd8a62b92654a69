//! API layer
//!
//! HTTP handlers for:
//! - Home page
//! - Settings
//! - Metrics (Prometheus)
//!
//! plus the middleware shared by every route.

mod home;
mod middleware;
pub mod metrics;
mod settings;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

pub use home::home_router;
pub use metrics::metrics_router;
pub use middleware::{
    MakeRequestUlid, REQUEST_ID_HEADER, render_error_page, request_id, request_span,
    track_requests,
};
pub use settings::settings_router;

/// `302 Found` redirect to `location`
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
