// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Background eviction of idle tracking state.
//!
//! The sweeper runs on its own timer, independent of request traffic, and
//! asks each registered target to drop entries that have gone idle. Targets
//! delete shard by shard, so a sweep never holds more than one shard lock
//! at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// State that can shed idle entries.
pub trait Evict: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Remove entries idle at `now`; returns how many were removed.
    fn evict_idle_at(&self, now: Instant) -> usize;

    fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }
}

/// Periodic sweeper over one or more [`Evict`] targets.
pub struct EvictionSweeper {
    interval: Duration,
    targets: Vec<Arc<dyn Evict>>,
}

impl EvictionSweeper {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            targets: Vec::new(),
        }
    }

    /// Register a target to sweep.
    pub fn with_target(mut self, target: Arc<dyn Evict>) -> Self {
        self.targets.push(target);
        self
    }

    /// Sweep every target once.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut total = 0;
        for target in &self.targets {
            let removed = target.evict_idle_at(now);
            if removed > 0 {
                debug!(target = target.name(), removed, "Evicted idle entries");
            }
            total += removed;
        }
        total
    }

    /// Run on a background task until `shutdown` becomes `true` or its
    /// sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, targets = self.targets.len(), "Eviction sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_at(Instant::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Eviction sweeper stopped");
    }
}
