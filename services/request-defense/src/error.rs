// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the defense layer and their HTTP rendering.
//!
//! `RateLimited` and `AccountLocked` are routine decisions, not faults.
//! `Metrics` and `Config` mean the defense layer itself is unhealthy and are
//! logged at error level when they reach the HTTP boundary.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Configuration errors, raised at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("idle eviction threshold ({idle_secs}s) must be greater than {window_secs}s")]
    IdleNotAboveWindow { idle_secs: u64, window_secs: u64 },

    #[error("{name} must not exceed {max_secs}s")]
    TooLarge { name: &'static str, max_secs: u64 },

    #[error("route path must start with '/': {0}")]
    InvalidPath(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors surfaced by the defense layer.
#[derive(Debug, Error)]
pub enum DefenseError {
    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("account locked, retry in {remaining_lockout_secs}s")]
    AccountLocked { remaining_lockout_secs: u64 },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DefenseError {
    /// Machine-checkable outcome kind carried in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::AccountLocked { .. } => "account_locked",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Metrics(_) | Self::Config(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::AccountLocked { .. } => StatusCode::LOCKED,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Metrics(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_lockout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<String>,
}

impl IntoResponse for DefenseError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorResponse {
            error: self.kind(),
            message: self.to_string(),
            retry_after_secs: None,
            remaining_lockout_seconds: None,
            locked_until: None,
        };

        let retry_after = match &self {
            Self::RateLimited { retry_after_secs } => {
                body.retry_after_secs = Some(*retry_after_secs);
                Some(*retry_after_secs)
            }
            Self::AccountLocked {
                remaining_lockout_secs,
            } => {
                body.remaining_lockout_seconds = Some(*remaining_lockout_secs);
                body.locked_until = i64::try_from(*remaining_lockout_secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .and_then(|remaining| chrono::Utc::now().checked_add_signed(remaining))
                    .map(|until| until.to_rfc3339());
                Some(*remaining_lockout_secs)
            }
            Self::InvalidCredentials => None,
            Self::Metrics(_) | Self::Config(_) => {
                error!(error = %self, "Defense layer fault");
                body.message = "internal error".to_string();
                None
            }
        };

        match retry_after {
            Some(secs) => (
                status,
                [(header::RETRY_AFTER, secs.to_string())],
                Json(body),
            )
                .into_response(),
            None => (status, Json(body)).into_response(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DefenseError>;
