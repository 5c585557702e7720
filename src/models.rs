use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

// Query string of the proxy route
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ProxyQuery {
    pub url: Option<String>,
    // JSON object of extra headers, still encoded
    pub headers: Option<String>,
}

// What came back from upstream, relayed as-is
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: HeaderValue,
    pub body: Vec<u8>,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}
