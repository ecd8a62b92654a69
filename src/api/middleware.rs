//! Cross-cutting HTTP middleware
//!
//! - ULID request IDs for `tower_http::request_id`
//! - Request spans for `tower_http::trace`
//! - HTML error pages carrying the request ID
//! - Request counting for Prometheus

use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::error::ErrorPage;
use crate::metrics::HTTP_REQUESTS_TOTAL;

/// Header carrying the request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates a ULID for requests that arrive without an `x-request-id`
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&ulid::Ulid::new().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of a request, `-` if none was assigned
pub fn request_id<B>(request: &axum::http::Request<B>) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

/// Span wrapping one request
///
/// Only the path is recorded: query strings can carry OAuth verifiers.
pub fn request_span<B>(request: &axum::http::Request<B>) -> tracing::Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request),
    )
}

/// Replace the body of error responses with an HTML page
///
/// Only responses produced from an [`AppError`](crate::error::AppError)
/// (marked with [`ErrorPage`]) are rewritten; the status is kept.
pub async fn render_error_page(request: Request, next: Next) -> Response {
    let request_id = request_id(&request);
    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_TYPE);
    let html = Html(error_page_html(&page, &request_id)).into_response();
    let (html_parts, body) = html.into_parts();
    parts.headers.extend(html_parts.headers);

    Response::from_parts(parts, body)
}

fn error_page_html(page: &ErrorPage, request_id: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Error - osutweet</title></head>
<body>
    <h1>{status}</h1>
    <p>{message}</p>
    <p>Request ID: <code>{request_id}</code></p>
    <a href="/">Back to home</a>
</body>
</html>
"#,
        status = page.status,
        message = html_escape::encode_text(&page.message),
        request_id = html_escape::encode_text(request_id),
    )
}

/// Count requests by method and final status
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn request_ids_are_ulids() {
        let request = axum::http::Request::new(());
        let id = MakeRequestUlid.make_request_id(&request).unwrap();
        let id = id.header_value().to_str().unwrap();
        assert_eq!(id.len(), 26);
        assert!(ulid::Ulid::from_string(id).is_ok());
    }

    #[test]
    fn error_page_escapes_message_and_shows_request_id() {
        let page = ErrorPage {
            status: StatusCode::BAD_REQUEST,
            message: "<script>alert(1)</script>".to_string(),
        };
        let html = error_page_html(&page, "01J0000000000000000000000");

        assert!(html.contains("400 Bad Request"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("01J0000000000000000000000"));
    }

    #[test]
    fn request_span_omits_query_string() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let request = axum::http::Request::builder()
            .uri("/connect/twitter/callback?oauth_token=tok&oauth_verifier=secret-verifier")
            .header(REQUEST_ID_HEADER, "01J0000000000000000000000")
            .body(())
            .unwrap();

        tracing::subscriber::with_default(subscriber, || {
            let span = request_span(&request);
            let _entered = span.enter();
            tracing::info!("handled");
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("path=/connect/twitter/callback"));
        assert!(output.contains("01J0000000000000000000000"));
        assert!(!output.contains("oauth_verifier"));
        assert!(!output.contains("secret-verifier"));
    }
}
