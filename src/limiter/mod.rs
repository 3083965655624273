//! Fixed-window, per-key attempt counter.
//!
//! Every key shares one `limit` and one `window`. A background task clears the
//! whole counter map once per window, so all keys regain their full quota at
//! the same moment. This bounds abuse per window without tracking per-key
//! timestamps.


use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, u32>>,
    limit: u32,
}

impl RateLimiter {
    /// Builds a limiter without a reset loop. Counters only clear on `reset`.
    pub fn new(limit: u32) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Builds a limiter and spawns its reset loop on the current tokio runtime.
    ///
    /// The loop holds a weak reference and stops once the limiter is dropped.
    pub fn start(limit: u32, window: Duration) -> Arc<Self> {
        Self::spawn(limit, window).0
    }

    pub(crate) fn spawn(limit: u32, window: Duration) -> (Arc<Self>, JoinHandle<()>) {
        let limiter = Arc::new(Self::new(limit));
        let handle = tokio::spawn(reset_loop(Arc::downgrade(&limiter), window));
        (limiter, handle)
    }

    /// Records an attempt for `key`. Returns `false` once `limit` attempts
    /// were already allowed in the current window.
    pub fn allow(&self, key: &str) -> bool {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let count = attempts.entry(key.to_string()).or_insert(0);
        if *count >= self.limit {
            return false;
        }
        *count += 1;
        true
    }

    /// Forget every counter.
    pub fn reset(&self) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of keys with a counter in the current window.
    pub fn len(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn reset_loop(limiter: Weak<RateLimiter>, window: Duration) {
    let mut ticker = interval_at(Instant::now() + window, window);
    loop {
        ticker.tick().await;
        let Some(limiter) = limiter.upgrade() else {
            debug!("rate limiter dropped; reset loop stopping");
            break;
        };
        limiter.reset();
        debug!(window_ms = window.as_millis() as u64, "rate limiter window reset");
    }
}
