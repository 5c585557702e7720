use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::redirect;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::models::UpstreamResponse;
use crate::policy::{GuardedResolver, NetworkPolicy};
use crate::target::ParsedTarget;

const MAX_REDIRECTS: usize = 10;

// Issues the single upstream GET for a request and bounds its time and size
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
    max_response_bytes: u64,
}

impl Forwarder {
    // A redirect hop the policy rejects is not followed, the 3xx is relayed
    pub fn new(
        policy: Arc<NetworkPolicy>,
        timeout: Duration,
        max_response_bytes: u64,
    ) -> Result<Self> {
        let hop_policy = Arc::clone(&policy);
        let redirect_policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            match hop_policy.check_url(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(err) => {
                    warn!(
                        location = %attempt.url(),
                        reason = %err,
                        "Refusing upstream redirect"
                    );
                    attempt.stop()
                }
            }
        });

        let mut builder = reqwest::Client::builder().redirect(redirect_policy);
        if policy.resolves_hosts() {
            builder = builder.dns_resolver(Arc::new(GuardedResolver));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            timeout,
            max_response_bytes,
        })
    }

    pub async fn forward(
        &self,
        target: &ParsedTarget,
        headers: HeaderMap,
    ) -> Result<UpstreamResponse> {
        // the timeout covers connect, headers and the whole body; on expiry
        // the in-flight connection is dropped
        let mut response = self
            .client
            .get(target.url().clone())
            .headers(headers)
            .timeout(self.timeout)
            .send()
            .await?;

        // declared size is checked before any of the body is read
        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.max_response_bytes) {
            return Err(GatewayError::PayloadTooLarge);
        }

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));

        // the declared size is only a claim, so grow with what actually arrives
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_response_bytes {
                return Err(GatewayError::PayloadTooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
