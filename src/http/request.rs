//! Request inspection.
//!
//! # Responsibilities
//! - Extract the virtual host name a request targets
//! - Read the request ID set by the request-id layer
//!
//! # Design Decisions
//! - `Host` header first, then the URI authority (HTTP/2 sends `:authority`)
//! - The port is never part of the host name used for routing

use axum::http::{HeaderMap, Uri, header};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Host name the request is addressed to, without port.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let raw = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))?;

    let host = strip_port(raw.trim());
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Drop a trailing `:port`. Bracketed IPv6 literals keep their brackets.
pub fn strip_port(authority: &str) -> &str {
    // userinfo never appears in Host, but may in a URI authority
    let authority = authority.rsplit('@').next().unwrap_or(authority);

    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }

    match authority.rfind(':') {
        Some(colon) => &authority[..colon],
        None => authority,
    }
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
