// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus export of the rate limiter's aggregate counters.

use crate::error::Result;
use crate::limiter::RateWindowTracker;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

pub const BLOCKED_REQUESTS_METRIC: &str = "defense_blocked_requests_total";
pub const ACTIVE_ENTRIES_METRIC: &str = "defense_active_entries";

/// Point-in-time reading of the tracker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefenseSnapshot {
    pub total_blocked_requests: u64,
    pub active_entries: usize,
}

impl DefenseSnapshot {
    pub fn read(tracker: &RateWindowTracker) -> Self {
        Self {
            total_blocked_requests: tracker.total_blocked_requests(),
            active_entries: tracker.active_entries(),
        }
    }
}

/// Republishes tracker counters as gauges in a private registry.
pub struct MetricsExporter {
    tracker: Arc<RateWindowTracker>,
    registry: Registry,
    blocked_requests: IntGauge,
    active_entries: IntGauge,
}

impl MetricsExporter {
    pub fn new(tracker: Arc<RateWindowTracker>) -> Result<Self> {
        let registry = Registry::new();
        let blocked_requests = IntGauge::new(
            BLOCKED_REQUESTS_METRIC,
            "Cumulative requests denied by the rate limiter",
        )?;
        let active_entries = IntGauge::new(
            ACTIVE_ENTRIES_METRIC,
            "Client keys currently tracked by the rate limiter",
        )?;
        registry.register(Box::new(blocked_requests.clone()))?;
        registry.register(Box::new(active_entries.clone()))?;

        Ok(Self {
            tracker,
            registry,
            blocked_requests,
            active_entries,
        })
    }

    /// Read the tracker and update both gauges.
    pub fn sample(&self) -> DefenseSnapshot {
        let snapshot = DefenseSnapshot::read(&self.tracker);
        self.blocked_requests
            .set(i64::try_from(snapshot.total_blocked_requests).unwrap_or(i64::MAX));
        self.active_entries
            .set(i64::try_from(snapshot.active_entries).unwrap_or(i64::MAX));
        snapshot
    }

    /// Sample, then encode the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        self.sample();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()).into())
    }
}
