//! Response construction from script results.
//!
//! # Design Decisions
//! - Headers a script sets that are not valid HTTP are dropped with a warning
//! - `connection: close` is added whenever the execution cleared keep-alive

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::script::{ScriptError, ScriptOutput};

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

pub fn from_output(output: ScriptOutput, keepalive: bool) -> Response {
    let status = StatusCode::from_u16(output.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(output.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in output.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    }

    close_unless(keepalive, response)
}

pub fn from_error(error: &ScriptError, keepalive: bool) -> Response {
    let response = match error {
        ScriptError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
        ScriptError::Busy => (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response(),
        ScriptError::ProcessTimeout => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Process Time Out!").into_response()
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
    };
    close_unless(keepalive, response)
}

fn close_unless(keepalive: bool, mut response: Response) -> Response {
    if !keepalive {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}
