use axum_core::body::Body;
use axum_core::response::Response;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, StatusCode, Uri};
use serde_json::json;
use url::Url;
use x402_types::headers;
use x402_types::proto::PaymentRequired;

use crate::requirements::quote_hash;

/// Inserts `value` under `name`, skipping values that are not valid header text.
pub(crate) fn insert_header(response: &mut Response, name: &str, value: &str) {
    match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => {
            response.headers_mut().insert(name, value);
        }
        _ => tracing::warn!(header = name, "Dropping invalid response header"),
    }
}

pub(crate) fn json_response(status: StatusCode, body: &serde_json::Value) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub(crate) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    json_response(status, &json!({ "error": code, "message": message }))
}

/// A 402 carrying `required` in `PAYMENT-REQUIRED` and its `X-Quote-Hash`.
pub(crate) fn payment_required_response(required: &PaymentRequired) -> Response {
    let body = serde_json::to_value(required).unwrap_or_else(|_| json!({}));
    let mut response = json_response(StatusCode::PAYMENT_REQUIRED, &body);
    match required.to_header() {
        Ok(header) => insert_header(&mut response, headers::PAYMENT_REQUIRED, &header),
        Err(e) => tracing::error!(error = %e, "Failed to encode PAYMENT-REQUIRED"),
    }
    insert_header(&mut response, headers::QUOTE_HASH, &quote_hash(required));
    response
}

/// Absolute URL of the requested resource: `base_url` joined with the
/// request path and query, `http://localhost/` when no base is configured.
pub(crate) fn resource_url(base_url: Option<&Url>, uri: &Uri) -> String {
    match base_url {
        Some(base_url) => {
            let mut url = base_url.clone();
            url.set_path(uri.path());
            url.set_query(uri.query());
            url.to_string()
        }
        None => {
            let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
            format!("http://localhost{path}")
        }
    }
}
