// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter keyed by client identity.
//!
//! Each client key owns one [`RateLimitEntry`] holding the start of its
//! current window and the number of requests seen since. Entries live in a
//! sharded map, so a decision only ever locks the shard holding its key and
//! unrelated clients proceed in parallel.
//!
//! Fixed windows allow up to twice the limit across a window boundary. That
//! burst is accepted in exchange for O(1) state per key.

use crate::config::RateLimitConfig;
use crate::error::ConfigError;
use crate::key::ClientKey;
use crate::sweeper::Evict;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed
    Allowed {
        /// Requests left in the current window
        remaining: u32,
        /// Time until the window resets
        reset_in: Duration,
    },
    /// Request must be rejected
    Denied {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Whole seconds to wait, rounded up so a client never retries early.
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Per-key counting state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Start of the current counting window
    pub window_start: Instant,
    /// Requests observed since `window_start`
    pub count: u32,
    /// Most recent request, denied or not
    pub last_access: Instant,
}

impl RateLimitEntry {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            last_access: now,
        }
    }
}

/// Thread-safe per-client request counter.
pub struct RateWindowTracker {
    max_requests: u32,
    window: Duration,
    idle_threshold: Duration,
    entries: DashMap<ClientKey, RateLimitEntry>,
    total_blocked: AtomicU64,
}

impl RateWindowTracker {
    /// Create a tracker. Fails if the configuration is inconsistent.
    pub fn new(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            max_requests: config.max_requests_per_window,
            window: config.window_duration(),
            idle_threshold: config.idle_threshold(),
            entries: DashMap::new(),
            total_blocked: AtomicU64::new(0),
        })
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request for `key` and decide whether it may proceed.
    pub fn try_acquire(&self, key: &ClientKey) -> Decision {
        self.try_acquire_at(key, Instant::now())
    }

    /// [`try_acquire`](Self::try_acquire) with an explicit clock reading.
    pub fn try_acquire_at(&self, key: &ClientKey, now: Instant) -> Decision {
        // Holds the shard write lock until the guard drops, which serialises
        // concurrent callers for the same key.
        let mut entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| RateLimitEntry::new(now));

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);
        entry.last_access = entry.last_access.max(now);

        let elapsed = now.saturating_duration_since(entry.window_start);
        let reset_in = self.window.saturating_sub(elapsed);
        let count = entry.count;
        drop(entry);

        if count > self.max_requests {
            self.total_blocked.fetch_add(1, Ordering::Relaxed);
            debug!(%key, count, ?reset_in, "Rate limit exceeded");
            Decision::Denied {
                retry_after: reset_in,
            }
        } else {
            Decision::Allowed {
                remaining: self.max_requests - count,
                reset_in,
            }
        }
    }

    /// Cumulative number of denied requests. Never decreases.
    pub fn total_blocked_requests(&self) -> u64 {
        self.total_blocked.load(Ordering::Relaxed)
    }

    /// Number of keys currently tracked.
    pub fn active_entries(&self) -> usize {
        self.entries.len()
    }

    /// Copy of the entry for `key`, if tracked.
    pub fn entry(&self, key: &ClientKey) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }
}

impl Evict for RateWindowTracker {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    /// Remove entries idle for at least the idle threshold.
    ///
    /// `retain` checks and deletes under the same shard lock that
    /// `try_acquire_at` takes, so an in-flight request never loses its entry.
    fn evict_idle_at(&self, now: Instant) -> usize {
        let idle = self.idle_threshold;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now.saturating_duration_since(entry.last_access) < idle;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}
