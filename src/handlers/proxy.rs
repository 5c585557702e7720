use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::headers;
use crate::metrics::{REJECTIONS_TOTAL, REQUEST_TOTAL, UPSTREAM_LATENCY};
use crate::models::{ProxyQuery, UpstreamResponse};
use crate::state::AppState;
use crate::target::ParsedTarget;

// Client key: forwarded address, then real ip, then the socket peer
fn client_key(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    REQUEST_TOTAL.inc();

    let (parts, _) = request.into_parts();
    let key = client_key(
        &parts.headers,
        parts.extensions.get::<ConnectInfo<SocketAddr>>(),
    );

    match handle(&state, &key, &parts.uri).await {
        Ok(upstream) => upstream.into_response(),
        Err(err) => {
            REJECTIONS_TOTAL.with_label_values(&[err.reason()]).inc();
            err.into_response()
        }
    }
}

// rate limit -> parse -> policy -> headers -> forward
async fn handle(state: &AppState, key: &str, uri: &Uri) -> Result<UpstreamResponse> {
    if !state.rate_limiter.allow(key) {
        warn!(client = %key, "Rate limit exceeded");
        return Err(GatewayError::RateLimited);
    }

    let Query(query) =
        Query::<ProxyQuery>::try_from_uri(uri).map_err(|_| GatewayError::InvalidUrl)?;
    info!(client = %key, url = query.url.as_deref().unwrap_or(""), "Proxy request");

    let target = ParsedTarget::parse(query.url.as_deref())?;

    if let Err(err) = state.policy.check(&target) {
        warn!(client = %key, host = target.host(), reason = %err, "Blocked proxy target");
        return Err(err);
    }
    if let Err(err) = state.policy.check_resolved(&target).await {
        warn!(
            client = %key,
            host = target.host(),
            reason = %err,
            "Blocked proxy target after resolving"
        );
        return Err(err);
    }

    let outbound = headers::compose(query.headers.as_deref())?;

    let started = Instant::now();
    let result = state.forwarder.forward(&target, outbound).await;
    let elapsed = started.elapsed();
    UPSTREAM_LATENCY.observe(elapsed.as_secs_f64());

    match &result {
        Ok(upstream) => info!(
            status = upstream.status.as_u16(),
            host = target.host(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Upstream responded"
        ),
        Err(GatewayError::Timeout) => warn!(
            host = target.host(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Upstream timed out"
        ),
        Err(err) => warn!(host = target.host(), error = %err, "Upstream request failed"),
    }
    result
}
