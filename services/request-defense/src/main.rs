// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request Defense Service
//!
//! Runs the rate limiting and login lockout filter in front of the login
//! route, health checks and the metrics endpoint.
//!
//! ## Configuration
//!
//! An optional JSON file named by `DEFENSE_CONFIG` is read first, then
//! environment variables override individual values:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `RATE_LIMIT_MAX_REQUESTS`: Requests per window per client (default: 100)
//! - `RATE_LIMIT_WINDOW_SECS`: Window length (default: 60)
//! - `RATE_LIMIT_IDLE_SECS`: Idle eviction threshold (default: 300)
//! - `SWEEP_INTERVAL_SECS`: Eviction sweep interval (default: 60)
//! - `LOCKOUT_THRESHOLD`: Failures before lockout (default: 5)
//! - `LOCKOUT_DURATION_SECS`: Lockout length (default: 900)
//! - `LOCKOUT_IDLE_SECS`: Idle eviction threshold for lockout records (default: 3600)
//! - `LOGIN_PATH`: Login route (default: /api/auth/login)
//! - `TRUST_FORWARDED_HEADERS`: Use X-Forwarded-For / X-Real-IP (default: false)
//! - `DEFENSE_CREDENTIALS`: `account:secret` pairs, comma separated

use anyhow::Context;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use request_defense::{
    auth::InMemoryCredentials,
    config::Config,
    error::ConfigError,
    handlers::{router, AppState},
    sweeper::EvictionSweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = load_config()?;
    info!(
        bind_addr = %config.bind_addr,
        max_requests_per_window = config.rate_limit.max_requests_per_window,
        window_secs = config.rate_limit.window_secs,
        lockout_threshold = config.lockout.failure_threshold,
        lockout_duration_secs = config.lockout.lockout_duration_secs,
        login_path = %config.filter.login_path,
        "Starting request defense service"
    );

    let credentials = match std::env::var("DEFENSE_CREDENTIALS") {
        Ok(pairs) => InMemoryCredentials::parse(&pairs)?,
        Err(_) => InMemoryCredentials::new(),
    };
    if credentials.is_empty() {
        warn!("No credentials configured, every login will fail");
    }

    let state = Arc::new(AppState::new(config.clone(), Arc::new(credentials))?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = EvictionSweeper::new(config.rate_limit.sweep_interval())
        .with_target(state.limiter.clone())
        .with_target(state.lockout.clone())
        .spawn(shutdown_rx);

    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for shutdown signal");
        }
        info!("Shutting down");
    })
    .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await?;

    Ok(())
}

/// Load configuration from an optional file and environment variables.
fn load_config() -> anyhow::Result<Config> {
    let mut config = match std::env::var("DEFENSE_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path))?
        }
        Err(_) => Config::default(),
    };

    if let Ok(addr) = std::env::var("BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(path) = std::env::var("LOGIN_PATH") {
        config.filter.login_path = path;
    }

    let rate = &mut config.rate_limit;
    override_from_env("RATE_LIMIT_MAX_REQUESTS", &mut rate.max_requests_per_window)?;
    override_from_env("RATE_LIMIT_WINDOW_SECS", &mut rate.window_secs)?;
    override_from_env("RATE_LIMIT_IDLE_SECS", &mut rate.idle_eviction_secs)?;
    override_from_env("SWEEP_INTERVAL_SECS", &mut rate.sweep_interval_secs)?;

    let lockout = &mut config.lockout;
    override_from_env("LOCKOUT_THRESHOLD", &mut lockout.failure_threshold)?;
    override_from_env("LOCKOUT_DURATION_SECS", &mut lockout.lockout_duration_secs)?;
    override_from_env("LOCKOUT_IDLE_SECS", &mut lockout.idle_eviction_secs)?;

    override_from_env(
        "TRUST_FORWARDED_HEADERS",
        &mut config.filter.trust_forwarded_headers,
    )?;

    config.validate()?;
    Ok(config)
}

fn override_from_env<T: FromStr>(name: &'static str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(name) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value })?;
    }
    Ok(())
}
