// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Attack simulation patterns for security testing.

use std::time::Duration;

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Requests per second rate
    pub requests_per_second: f64,
    /// Number of unique client addresses
    pub unique_clients: usize,
    /// Number of accounts targeted by login attempts
    pub target_accounts: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_clients: 1,
            target_accounts: 1,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Single client flood - basic DoS from one address.
    pub fn single_client_flood() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 100.0,
            ..Default::default()
        }
    }

    /// Distributed flood - many addresses, few requests each.
    pub fn distributed_flood() -> Self {
        Self {
            total_requests: 500,
            requests_per_second: 50.0,
            unique_clients: 100,
            ..Default::default()
        }
    }

    /// Slow drip - one request per second for several windows.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 150,
            requests_per_second: 1.0,
            ..Default::default()
        }
    }

    /// Credential stuffing - rotating addresses against one account.
    pub fn credential_stuffing() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_clients: 20,
            target_accounts: 1,
        }
    }

    /// Password spray - a couple of guesses against many accounts.
    pub fn password_spray() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_clients: 10,
            target_accounts: 50,
        }
    }

    /// Simulated arrival offset of request `index`.
    pub fn offset(&self, index: usize) -> Duration {
        Duration::from_secs_f64(index as f64 / self.requests_per_second)
    }

    /// Simulated span of the whole attack.
    pub fn expected_duration(&self) -> Duration {
        self.offset(self.total_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let config = AttackConfig::slow_drip();
        assert_eq!(config.offset(0), Duration::ZERO);
        assert_eq!(config.offset(61), Duration::from_secs(61));
        assert_eq!(config.expected_duration(), Duration::from_secs(150));
    }
}
