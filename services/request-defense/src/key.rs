// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client identity derivation.
//!
//! A client key is the originating address, optionally suffixed with the
//! authenticated account id (`203.0.113.7|alice`). Extraction is a pure
//! function of the request headers, the peer address and the account.

use axum::http::HeaderMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const UNKNOWN: &str = "unknown";

/// Opaque identity a rate-limit decision is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

/// Account id placed in request extensions by upstream authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount(pub String);

/// Derives client keys from inbound requests.
#[derive(Debug, Clone, Default)]
pub struct ClientKeyExtractor {
    trust_forwarded_headers: bool,
}

impl ClientKeyExtractor {
    pub fn new(trust_forwarded_headers: bool) -> Self {
        Self {
            trust_forwarded_headers,
        }
    }

    /// Resolve the originating address.
    ///
    /// Forwarding headers are only consulted when trusted. Loopback values
    /// in those headers are treated as spoofing and ignored.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
        if self.trust_forwarded_headers {
            // "client, proxy1, proxy2": the first hop is the original client
            let forwarded = header_str(headers, FORWARDED_FOR)
                .and_then(|v| v.split(',').next())
                .and_then(parse_untrusted_ip);
            if forwarded.is_some() {
                return forwarded;
            }

            let real = header_str(headers, REAL_IP).and_then(parse_untrusted_ip);
            if real.is_some() {
                return real;
            }
        }

        peer.map(|addr| addr.ip())
    }

    /// Build the client key for a request.
    pub fn extract(
        &self,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        account: Option<&AuthenticatedAccount>,
    ) -> ClientKey {
        let ip = self
            .client_ip(headers, peer)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());

        match account {
            Some(AuthenticatedAccount(id)) if !id.trim().is_empty() => {
                ClientKey(format!("{}|{}", ip, account_key(id)))
            }
            _ => ClientKey(ip),
        }
    }
}

/// Normalise an account identifier for lockout tracking.
pub fn account_key(account: &str) -> String {
    account.trim().to_lowercase()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_untrusted_ip(value: &str) -> Option<IpAddr> {
    let ip: IpAddr = value.trim().parse().ok()?;
    if ip.is_loopback() {
        None
    } else {
        Some(ip)
    }
}
