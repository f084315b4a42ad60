// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

use request_defense::ClientKey;
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate client keys for a pool of addresses.
pub fn generate_client_keys(count: usize) -> Vec<ClientKey> {
    generate_ips(count).into_iter().map(ClientKey::from).collect()
}

/// Generate account identifiers.
pub fn generate_accounts(count: usize, domain: &str) -> Vec<String> {
    (0..count)
        .map(|i| format!("user{}@{}", i, domain))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_generate_accounts() {
        let accounts = generate_accounts(3, "example.com");
        assert_eq!(accounts, vec![
            "user0@example.com",
            "user1@example.com",
            "user2@example.com",
        ]);
    }
}
