use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::line::error::CredentialError;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// no usable channel access token, nothing was forwarded
    #[error("credential unavailable: {0}")]
    Credential(#[from] CredentialError),
    #[error("upstream request failed: {0}")]
    UpstreamForwardFailure(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Credential(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamForwardFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ProxyError::Credential(_) => "credential_unavailable",
            ProxyError::UpstreamForwardFailure(_) => "upstream_forward_failure",
            ProxyError::InvalidRequest(_) => "invalid_request",
            ProxyError::PayloadTooLarge(_) => "payload_too_large",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
