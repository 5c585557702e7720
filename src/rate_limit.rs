use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

use crate::metrics::RATE_LIMIT_CLIENTS;

// Rate limit entry - tracks requests per client key within one fixed window
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Per-client request budget.
///
/// Handlers only see this trait, so the in-memory map can be replaced with a
/// shared counter without touching the request pipeline.
pub trait RateLimitStore: Send + Sync {
    fn allow(&self, key: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops records whose window has already ended.
    fn sweep(&self);
}

// Fixed-window limiter backed by a DashMap
pub struct MemoryRateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    limit: u32,
    window: Duration,
}

impl MemoryRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
        }
    }

    // The shard lock is held only for this read-check-increment
    fn allow_at(&self, key: &str, now: Instant) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(RateLimitEntry {
                    count: 1,
                    reset_at: now + self.window,
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();

                // window over..? start a new one
                if now > entry.reset_at {
                    *entry = RateLimitEntry {
                        count: 1,
                        reset_at: now + self.window,
                    };
                    return true;
                }

                if entry.count >= self.limit {
                    return false;
                }

                entry.count += 1;
                true
            }
        }
    }

    fn sweep_at(&self, now: Instant) {
        self.entries.retain(|_, entry| now <= entry.reset_at);
    }
}

impl RateLimitStore for MemoryRateLimiter {
    fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn sweep(&self) {
        self.sweep_at(Instant::now());
    }
}

// Sweeper - drops finished windows so the map stays bounded by active clients
pub async fn sweeper(store: Arc<dyn RateLimitStore>, every: Duration) {
    let mut interval = interval(every);

    loop {
        interval.tick().await;
        store.sweep();
        RATE_LIMIT_CLIENTS.set(store.len() as f64);
        debug!(clients = store.len(), "Swept rate limit records");
    }
}
