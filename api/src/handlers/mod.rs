//! HTTP handlers
//!
//! Axum request handlers for the API endpoints.
//! Supports content negotiation: JSON by default, `Accept: text/plain` for markdown.

pub mod import;
pub mod members;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub use import::{download_report, import_members};
pub use members::{
    create_member, expire_member, expire_members, get_member, list_members, revert_member,
    revert_members, update_member,
};

/// Check if the client wants a plain-text response
fn wants_text(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/plain") && !v.contains("application/json"))
        .unwrap_or(false)
}

/// JSON body or rendered markdown, depending on the Accept header
fn negotiate<T: Serialize>(
    headers: &HeaderMap,
    status: StatusCode,
    body: &T,
    render: impl FnOnce() -> String,
) -> Response {
    if wants_text(headers) {
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            render(),
        )
            .into_response()
    } else {
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn accept(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn json_is_default() {
        assert!(!wants_text(&HeaderMap::new()));
        assert!(!wants_text(&accept("*/*")));
        assert!(!wants_text(&accept("application/json, text/plain")));
    }

    #[test]
    fn text_plain_selects_markdown() {
        assert!(wants_text(&accept("text/plain")));
        assert!(wants_text(&accept("text/plain; charset=utf-8")));
    }
}
