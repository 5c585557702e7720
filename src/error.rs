use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::error::Error as _;
use thiserror::Error;

use crate::policy::BlockedAddress;

// Every way a proxied request can be rejected or fail, one status each
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Missing url parameter")]
    MissingParameter,

    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Only HTTP/HTTPS protocols allowed")]
    UnsupportedScheme,

    #[error("Invalid headers JSON")]
    InvalidHeaderJson,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Access to private IP ranges not allowed in production")]
    PrivateNetworkBlocked,

    #[error("Domain not allowed")]
    DomainNotAllowed,

    #[error("Response too large")]
    PayloadTooLarge,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to resolve host: {0}")]
    Resolve(String),

    #[error("{0}")]
    Forward(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingParameter
            | GatewayError::InvalidUrl
            | GatewayError::UnsupportedScheme
            | GatewayError::InvalidHeaderJson
            | GatewayError::InvalidHeader(_) => StatusCode::BAD_REQUEST,

            GatewayError::PrivateNetworkBlocked | GatewayError::DomainNotAllowed => {
                StatusCode::FORBIDDEN
            }

            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,

            GatewayError::Resolve(_) | GatewayError::Forward(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // label for the rejection metric
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::MissingParameter => "missing_parameter",
            GatewayError::InvalidUrl => "invalid_url",
            GatewayError::UnsupportedScheme => "unsupported_scheme",
            GatewayError::InvalidHeaderJson => "invalid_header_json",
            GatewayError::InvalidHeader(_) => "invalid_header",
            GatewayError::PrivateNetworkBlocked => "private_network",
            GatewayError::DomainNotAllowed => "domain_not_allowed",
            GatewayError::PayloadTooLarge => "payload_too_large",
            GatewayError::RateLimited => "rate_limited",
            GatewayError::Timeout => "timeout",
            GatewayError::Resolve(_) => "resolve",
            GatewayError::Forward(_) => "forward",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return GatewayError::Timeout;
        }

        // the guarded resolver's refusal arrives wrapped in connect errors
        let mut cause = err.source();
        while let Some(inner) = cause {
            if inner.is::<BlockedAddress>() {
                return GatewayError::PrivateNetworkBlocked;
            }
            cause = inner.source();
        }

        GatewayError::Forward(err.to_string())
    }
}
