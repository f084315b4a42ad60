// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP surface of the defense service.
//!
//! Every route, including the fallback, sits behind [`defense_filter`].

use crate::auth::{Authenticator, CredentialVerifier, LoginRequest};
use crate::config::Config;
use crate::error::{DefenseError, ErrorResponse};
use crate::filter::defense_filter;
use crate::key::ClientKeyExtractor;
use crate::limiter::RateWindowTracker;
use crate::lockout::LockoutGuard;
use crate::metrics::MetricsExporter;
use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub extractor: ClientKeyExtractor,
    pub limiter: Arc<RateWindowTracker>,
    pub lockout: Arc<LockoutGuard>,
    pub authenticator: Authenticator,
    pub metrics: MetricsExporter,
}

impl AppState {
    /// Build all components from configuration.
    pub fn new(
        config: Config,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self, DefenseError> {
        config.validate()?;
        let limiter = Arc::new(RateWindowTracker::new(&config.rate_limit)?);
        let lockout = Arc::new(LockoutGuard::new(&config.lockout)?);
        let metrics = MetricsExporter::new(limiter.clone())?;

        Ok(Self {
            extractor: ClientKeyExtractor::new(config.filter.trust_forwarded_headers),
            authenticator: Authenticator::new(lockout.clone(), verifier),
            limiter,
            lockout,
            metrics,
            config,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
}

/// Build the router with the filter applied to every route.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route(&state.config.filter.login_path, post(login));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), defense_filter))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "request-defense",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, DefenseError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

/// Login endpoint.
///
/// The filter has already turned away locked accounts; the authenticator
/// checks again so the handler is safe on its own.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, DefenseError> {
    state.authenticator.authenticate(&req.account, &req.password)?;
    Ok(Json(LoginResponse {
        status: "authenticated",
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found",
            message: "no such route".to_string(),
            retry_after_secs: None,
            remaining_lockout_seconds: None,
            locked_until: None,
        }),
    )
}
