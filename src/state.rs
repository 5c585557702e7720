use std::sync::Arc;

use crate::config::Args;
use crate::error::Result;
use crate::forward::Forwarder;
use crate::policy::NetworkPolicy;
use crate::rate_limit::{MemoryRateLimiter, RateLimitStore};
// app's shared state

#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: Arc<dyn RateLimitStore>, // the only state shared across requests
    pub policy: Arc<NetworkPolicy>,
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(
        rate_limiter: Arc<dyn RateLimitStore>,
        policy: Arc<NetworkPolicy>,
        forwarder: Forwarder,
    ) -> Self {
        Self {
            rate_limiter,
            policy,
            forwarder,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let policy = Arc::new(NetworkPolicy::new(
            args.is_production(),
            args.allow_list(),
            args.resolve_hosts,
        ));
        let forwarder = Forwarder::new(
            Arc::clone(&policy),
            args.timeout(),
            args.max_response_bytes,
        )?;
        let rate_limiter = Arc::new(MemoryRateLimiter::new(args.rate_limit, args.rate_window()));

        Ok(Self::new(rate_limiter, policy, forwarder))
    }
}
