// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the request defense layer.
//!
//! Every value here is read once at startup and never mutated afterwards.
//! The rate limiter and lockout guard validate their own section on
//! construction and refuse to start with an inconsistent configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for every duration setting, one leap year.
pub const MAX_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

/// Top-level configuration for the defense service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Per-client rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Login lockout
    #[serde(default)]
    pub lockout: LockoutConfig,

    /// HTTP filter behaviour
    #[serde(default)]
    pub filter: FilterConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests a client key may issue per window (default: 100)
    #[serde(default = "default_max_requests")]
    pub max_requests_per_window: u32,

    /// Length of the counting window in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Entries idle for longer than this are evicted (default: 300).
    /// Must be strictly greater than `window_secs`.
    #[serde(default = "default_rate_idle_secs")]
    pub idle_eviction_secs: u64,

    /// How often the eviction sweeper runs in seconds (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Account lockout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Consecutive failures that lock an account (default: 5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long a lock lasts in seconds (default: 900)
    #[serde(default = "default_lockout_duration_secs")]
    pub lockout_duration_secs: u64,

    /// Unlocked records idle for longer than this are evicted (default: 3600).
    /// Must be strictly greater than `lockout_duration_secs`.
    #[serde(default = "default_lockout_idle_secs")]
    pub idle_eviction_secs: u64,
}

/// Filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Path of the login route guarded by the lockout check
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Derive the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,

    /// Largest login body the filter will buffer to read the account field
    #[serde(default = "default_login_body_limit")]
    pub login_body_limit_bytes: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

fn default_rate_idle_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_lockout_duration_secs() -> u64 {
    900 // 15 minutes
}

fn default_lockout_idle_secs() -> u64 {
    3600
}

fn default_login_path() -> String {
    "/api/auth/login".to_string()
}

fn default_login_body_limit() -> usize {
    16 * 1024
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            lockout: LockoutConfig::default(),
            filter: FilterConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_max_requests(),
            window_secs: default_window_secs(),
            idle_eviction_secs: default_rate_idle_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            lockout_duration_secs: default_lockout_duration_secs(),
            idle_eviction_secs: default_lockout_idle_secs(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            trust_forwarded_headers: false,
            login_body_limit_bytes: default_login_body_limit(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.lockout.validate()?;
        if self.filter.login_body_limit_bytes == 0 {
            return Err(ConfigError::Zero("filter.login_body_limit_bytes"));
        }
        if !self.filter.login_path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.filter.login_path.clone()));
        }
        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.metrics.path.clone()));
        }
        Ok(())
    }
}

impl RateLimitConfig {
    /// Get the counting window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the idle eviction threshold
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests_per_window == 0 {
            return Err(ConfigError::Zero("rate_limit.max_requests_per_window"));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Zero("rate_limit.window_secs"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Zero("rate_limit.sweep_interval_secs"));
        }
        check_bound("rate_limit.window_secs", self.window_secs)?;
        check_bound("rate_limit.idle_eviction_secs", self.idle_eviction_secs)?;
        check_bound("rate_limit.sweep_interval_secs", self.sweep_interval_secs)?;
        if self.idle_eviction_secs <= self.window_secs {
            return Err(ConfigError::IdleNotAboveWindow {
                idle_secs: self.idle_eviction_secs,
                window_secs: self.window_secs,
            });
        }
        Ok(())
    }
}

impl LockoutConfig {
    /// Get the lockout duration
    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }

    /// Get the idle eviction threshold
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Zero("lockout.failure_threshold"));
        }
        if self.lockout_duration_secs == 0 {
            return Err(ConfigError::Zero("lockout.lockout_duration_secs"));
        }
        check_bound("lockout.lockout_duration_secs", self.lockout_duration_secs)?;
        check_bound("lockout.idle_eviction_secs", self.idle_eviction_secs)?;
        if self.idle_eviction_secs <= self.lockout_duration_secs {
            return Err(ConfigError::IdleNotAboveWindow {
                idle_secs: self.idle_eviction_secs,
                window_secs: self.lockout_duration_secs,
            });
        }
        Ok(())
    }
}

fn check_bound(name: &'static str, secs: u64) -> Result<(), ConfigError> {
    if secs > MAX_DURATION_SECS {
        return Err(ConfigError::TooLarge {
            name,
            max_secs: MAX_DURATION_SECS,
        });
    }
    Ok(())
}
