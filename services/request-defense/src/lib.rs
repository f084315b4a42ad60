// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request Defense
//!
//! Process-local request defense for an HTTP API:
//!
//! - Per-client fixed-window rate limiting in front of every route
//! - Idle-entry eviction on a background timer
//! - Account lockout after repeated login failures
//! - Prometheus gauges for blocked requests and tracked clients

pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod key;
pub mod limiter;
pub mod lockout;
pub mod metrics;
pub mod sweeper;

pub use config::Config;
pub use error::{ConfigError, DefenseError};
pub use key::{ClientKey, ClientKeyExtractor};
pub use limiter::{Decision, RateWindowTracker};
pub use lockout::{LockStatus, LockoutGuard};
pub use metrics::{DefenseSnapshot, MetricsExporter};
pub use sweeper::{EvictionSweeper, Evict};
