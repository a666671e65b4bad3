use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::types::Identity;

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started_at: Instant,
    count: usize,
}

/// Fixed-window request counter keyed by user.
///
/// Windows are never swept: the allow-list bounds how many keys can exist,
/// and only allow-listed users reach the limiter.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    // std Mutex: the critical section is a HashMap lookup, never held
    // across `.await`.
    windows: Mutex<HashMap<Identity, WindowState>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Consume one slot for `identity`. Returns `false` when the window is
    /// exhausted.
    pub fn check_and_consume(&self, identity: Identity) -> bool {
        self.check_and_consume_at(identity, Instant::now())
    }

    pub fn check_and_consume_at(&self, identity: Identity, now: Instant) -> bool {
        if self.limit.max_requests == 0 {
            return false;
        }

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = windows.get_mut(&identity) else {
            windows.insert(identity, WindowState {
                started_at: now,
                count: 1,
            });
            return true;
        };

        if now.saturating_duration_since(state.started_at) > self.limit.window {
            state.started_at = now;
            state.count = 1;
            true
        } else if state.count >= self.limit.max_requests {
            false
        } else {
            state.count += 1;
            true
        }
    }
}
