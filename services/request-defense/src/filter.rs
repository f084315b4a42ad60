// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request filter applied in front of every route.
//!
//! Every request is counted against its client key. Denied requests are
//! answered here and never reach a handler. On the login route the filter
//! additionally reads the account from the body and turns locked accounts
//! away before any credential check runs.

use crate::auth::LoginIdentity;
use crate::config::FilterConfig;
use crate::error::{DefenseError, ErrorResponse};
use crate::handlers::AppState;
use crate::key::{account_key, AuthenticatedAccount};
use crate::limiter::{ceil_secs, Decision};
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Axum middleware enforcing the rate limit and login lockout.
pub async fn defense_filter(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.extractor.extract(
        request.headers(),
        peer,
        request.extensions().get::<AuthenticatedAccount>(),
    );

    let remaining = match state.limiter.try_acquire(&key) {
        Decision::Allowed { remaining, .. } => remaining,
        Decision::Denied { retry_after } => {
            let retry_after_secs = ceil_secs(retry_after).max(1);
            info!(
                %key,
                path = %request.uri().path(),
                retry_after_secs,
                "Request rate limited"
            );
            return DefenseError::RateLimited { retry_after_secs }.into_response();
        }
    };

    let request = if is_login(&state.config.filter, &request) {
        match lockout_gate(&state, request).await {
            Ok(request) => request,
            Err(response) => return response,
        }
    } else {
        request
    };

    debug!(%key, remaining, "Request allowed");

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(state.limiter.max_requests()));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
    response
}

fn is_login(config: &FilterConfig, request: &Request) -> bool {
    request.method() == Method::POST && request.uri().path() == config.login_path
}

/// Buffer the login body, reject locked accounts, and rebuild the request.
async fn lockout_gate(state: &AppState, request: Request) -> Result<Request, Response> {
    let (parts, body) = request.into_parts();
    let bytes = match Limited::new(body, state.config.filter.login_body_limit_bytes)
        .collect()
        .await
    {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "Unreadable login body");
            return Err(unreadable_body(&err));
        }
    };

    // Malformed bodies pass through; the login handler rejects them.
    let identity: LoginIdentity = serde_json::from_slice(&bytes).unwrap_or_default();
    if let Some(account) = identity.account.as_deref() {
        if let Err(err) = state.lockout.check(account) {
            info!(account = %account_key(account), "Login rejected, account locked");
            return Err(err.into_response());
        }
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// 413 when the body exceeded the limit, 400 for any other read failure.
fn unreadable_body(err: &BoxError) -> Response {
    let (status, error, message) = if err.is::<LengthLimitError>() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "body_too_large",
            "login body exceeds the size limit",
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            "body_unreadable",
            "login body could not be read",
        )
    };
    (
        status,
        Json(ErrorResponse {
            error,
            message: message.to_string(),
            retry_after_secs: None,
            remaining_lockout_seconds: None,
            locked_until: None,
        }),
    )
        .into_response()
}
