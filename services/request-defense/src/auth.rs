// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Login flow wired to the lockout guard.
//!
//! Credential verification itself sits behind [`CredentialVerifier`]; the
//! [`Authenticator`] only decides when verification may run and reports the
//! outcome back to the [`LockoutGuard`].

use crate::error::{ConfigError, DefenseError};
use crate::lockout::{LockStatus, LockoutGuard};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    pub account: String,
    pub password: String,
}

/// Just the account field of a login body, read by the filter.
#[derive(Debug, Default, Deserialize)]
pub struct LoginIdentity {
    #[serde(default, alias = "email", alias = "username")]
    pub account: Option<String>,
}

/// Checks a secret against an account.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, account: &str, secret: &str) -> bool;
}

/// Fixed account table, loaded from configuration.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCredentials {
    accounts: HashMap<String, String>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: &str, secret: &str) -> Self {
        self.accounts
            .insert(crate::key::account_key(account), secret.to_string());
        self
    }

    /// Parse `account:secret` pairs separated by commas.
    pub fn parse(pairs: &str) -> Result<Self, ConfigError> {
        let mut credentials = Self::new();
        for pair in pairs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match pair.split_once(':') {
                Some((account, secret)) if !account.trim().is_empty() && !secret.is_empty() => {
                    credentials = credentials.with_account(account, secret);
                }
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "DEFENSE_CREDENTIALS",
                        value: pair.split(':').next().unwrap_or_default().to_string(),
                    })
                }
            }
        }
        Ok(credentials)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl CredentialVerifier for InMemoryCredentials {
    fn verify(&self, account: &str, secret: &str) -> bool {
        match self.accounts.get(&crate::key::account_key(account)) {
            Some(expected) => constant_time_eq(expected.as_bytes(), secret.as_bytes()),
            None => {
                let _ = constant_time_eq(UNKNOWN_ACCOUNT_SECRET, secret.as_bytes());
                false
            }
        }
    }
}

/// Compared against for unknown accounts so they cost the same as known ones.
const UNKNOWN_ACCOUNT_SECRET: &[u8] = b"unknown-account-placeholder-secret";

/// Byte comparison whose running time depends only on the longer input.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff = a.len() ^ b.len();
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Runs a login attempt through the lockout guard.
pub struct Authenticator {
    guard: Arc<LockoutGuard>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl Authenticator {
    pub fn new(guard: Arc<LockoutGuard>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { guard, verifier }
    }

    pub fn guard(&self) -> &Arc<LockoutGuard> {
        &self.guard
    }

    /// Authenticate, short-circuiting before verification if locked.
    pub fn authenticate(&self, account: &str, secret: &str) -> Result<(), DefenseError> {
        self.authenticate_at(account, secret, Instant::now())
    }

    pub fn authenticate_at(
        &self,
        account: &str,
        secret: &str,
        now: Instant,
    ) -> Result<(), DefenseError> {
        self.guard.check_at(account, now)?;

        if self.verifier.verify(account, secret) {
            // A concurrent failure may have locked the account since the check
            if let Some(remaining_lockout_secs) = self
                .guard
                .record_success_at(account, now)
                .remaining_lockout_secs()
            {
                return Err(DefenseError::AccountLocked {
                    remaining_lockout_secs,
                });
            }
            info!(account = %crate::key::account_key(account), "Login succeeded");
            return Ok(());
        }

        match self.guard.record_failure_at(account, now) {
            LockStatus::Open => {
                debug!(
                    account = %crate::key::account_key(account),
                    failed_attempts = self.guard.failed_attempts(account),
                    "Login failed"
                );
                Err(DefenseError::InvalidCredentials)
            }
            status @ LockStatus::Locked { .. } => Err(DefenseError::AccountLocked {
                remaining_lockout_secs: status.remaining_lockout_secs().unwrap_or_default(),
            }),
        }
    }
}
