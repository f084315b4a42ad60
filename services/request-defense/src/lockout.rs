// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Account lockout after repeated authentication failures.
//!
//! Each account is either open or locked. Failures while open count towards
//! the threshold; reaching it locks the account for a fixed duration. The
//! lock lifts on its own once the duration has passed, and the next
//! observation of the account resets its failure count. A successful login
//! clears the record of an open account; it never lifts a lock.

use crate::config::LockoutConfig;
use crate::error::{ConfigError, DefenseError};
use crate::key::account_key;
use crate::limiter::ceil_secs;
use crate::sweeper::Evict;
use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Lock state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Open,
    Locked { remaining: Duration },
}

impl LockStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked { .. })
    }

    /// Seconds until the lock lifts, rounded up. `None` when open.
    pub fn remaining_lockout_secs(&self) -> Option<u64> {
        match self {
            LockStatus::Open => None,
            LockStatus::Locked { remaining } => Some(ceil_secs(*remaining)),
        }
    }
}

/// Failure tracking for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutRecord {
    /// Consecutive failures since the last success or lock expiry
    pub failed_attempts: u32,
    /// Set only while the threshold has been reached
    pub locked_until: Option<Instant>,
    /// Most recent failure, used for eviction
    pub last_failure: Instant,
}

impl LockoutRecord {
    fn new(now: Instant) -> Self {
        Self {
            failed_attempts: 0,
            locked_until: None,
            last_failure: now,
        }
    }

    /// Clear an expired lock. Returns the current status.
    fn observe(&mut self, now: Instant) -> LockStatus {
        match self.locked_until {
            Some(until) if now < until => LockStatus::Locked {
                remaining: until - now,
            },
            Some(_) => {
                self.failed_attempts = 0;
                self.locked_until = None;
                LockStatus::Open
            }
            None => LockStatus::Open,
        }
    }
}

/// Thread-safe lockout tracker keyed by normalised account id.
pub struct LockoutGuard {
    threshold: u32,
    lockout_duration: Duration,
    idle_threshold: Duration,
    records: DashMap<String, LockoutRecord>,
}

impl LockoutGuard {
    /// Create a guard. Fails if the configuration is inconsistent.
    pub fn new(config: &LockoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            threshold: config.failure_threshold,
            lockout_duration: config.lockout_duration(),
            idle_threshold: config.idle_threshold(),
            records: DashMap::new(),
        })
    }

    pub fn is_locked(&self, account: &str) -> LockStatus {
        self.is_locked_at(account, Instant::now())
    }

    pub fn is_locked_at(&self, account: &str, now: Instant) -> LockStatus {
        let key = account_key(account);
        match self.records.get_mut(&key) {
            Some(mut record) => {
                let was_locked = record.locked_until.is_some();
                let status = record.observe(now);
                if was_locked && !status.is_locked() {
                    info!(account = %key, "Lockout expired");
                }
                status
            }
            None => LockStatus::Open,
        }
    }

    /// Reject the attempt if the account is locked.
    pub fn check(&self, account: &str) -> Result<(), DefenseError> {
        self.check_at(account, Instant::now())
    }

    pub fn check_at(&self, account: &str, now: Instant) -> Result<(), DefenseError> {
        match self.is_locked_at(account, now).remaining_lockout_secs() {
            Some(remaining_lockout_secs) => Err(DefenseError::AccountLocked {
                remaining_lockout_secs,
            }),
            None => Ok(()),
        }
    }

    /// Record a failed authentication. Returns the resulting status.
    ///
    /// A failure reported while the account is already locked does not
    /// count and does not extend the lock.
    pub fn record_failure(&self, account: &str) -> LockStatus {
        self.record_failure_at(account, Instant::now())
    }

    pub fn record_failure_at(&self, account: &str, now: Instant) -> LockStatus {
        let key = account_key(account);
        let mut record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| LockoutRecord::new(now));

        if let status @ LockStatus::Locked { .. } = record.observe(now) {
            return status;
        }

        record.failed_attempts = record.failed_attempts.saturating_add(1);
        record.last_failure = record.last_failure.max(now);

        if record.failed_attempts >= self.threshold {
            let Some(until) = now.checked_add(self.lockout_duration) else {
                error!(account = %key, "Lockout end not representable, lock skipped");
                return LockStatus::Open;
            };
            record.locked_until = Some(until);
            let attempts = record.failed_attempts;
            drop(record);
            warn!(
                account = %key,
                attempts,
                lockout_secs = self.lockout_duration.as_secs(),
                "Account locked after repeated failures"
            );
            LockStatus::Locked {
                remaining: self.lockout_duration,
            }
        } else {
            LockStatus::Open
        }
    }

    /// Record a successful authentication, clearing any failure history.
    ///
    /// A locked account stays locked until its lock expires; the returned
    /// status says which case applied.
    pub fn record_success(&self, account: &str) -> LockStatus {
        self.record_success_at(account, Instant::now())
    }

    pub fn record_success_at(&self, account: &str, now: Instant) -> LockStatus {
        match self.records.entry(account_key(account)) {
            Entry::Occupied(mut entry) => {
                let status = entry.get_mut().observe(now);
                if !status.is_locked() {
                    entry.remove();
                }
                status
            }
            Entry::Vacant(_) => LockStatus::Open,
        }
    }

    /// Current failure count for an account.
    pub fn failed_attempts(&self, account: &str) -> u32 {
        self.records
            .get(&account_key(account))
            .map(|r| r.failed_attempts)
            .unwrap_or(0)
    }

    /// Number of accounts with a failure record.
    pub fn tracked_accounts(&self) -> usize {
        self.records.len()
    }
}

impl Evict for LockoutGuard {
    fn name(&self) -> &'static str {
        "lockout"
    }

    /// Locked records are kept until their lock lifts; open records go once
    /// their last failure is older than the idle threshold.
    fn evict_idle_at(&self, now: Instant) -> usize {
        let idle = self.idle_threshold;
        let mut removed = 0;
        self.records.retain(|_, record| {
            let locked = record.locked_until.is_some_and(|until| now < until);
            let keep = locked || now.saturating_duration_since(record.last_failure) < idle;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}
