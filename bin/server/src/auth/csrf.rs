//! CSRF enforcement for mutating requests.
//!
//! Skipped for safe methods, for the login endpoint, and for requests that
//! carry no session token, since there is nothing to bind a token to. Every
//! other request must present an `X-CSRF-Token` bound to its session.

use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, Method, header::USER_AGENT},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rim_platform_access::csrf::{CSRF_HEADER, validate_token};
use std::net::SocketAddr;
use tracing::warn;

use super::session_token;
use crate::error::ApiError;

/// Login has no session to bind to yet.
const LOGIN_PATH: &str = "/api/v1/auth/telegram";

/// Middleware rejecting mutating requests whose CSRF token is missing or
/// bound to another session.
pub async fn enforce(request: Request, next: Next) -> Response {
    if !requires_check(request.method(), request.uri().path()) {
        return next.run(request).await;
    }
    let Some(session) = session_token(request.headers()) else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !validate_token(&session, presented) {
        warn!(
            ip = %client_ip(&request),
            user_agent = request
                .headers()
                .get(USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("unknown"),
            method = %request.method(),
            path = request.uri().path(),
            "invalid CSRF token"
        );
        return ApiError::Forbidden("invalid CSRF token").into_response();
    }

    next.run(request).await
}

// Debug-mode reads are GETs and fall under the safe-method rule.
fn requires_check(method: &Method, path: &str) -> bool {
    let safe = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
    !safe && path != LOGIN_PATH
}

fn client_ip(request: &Request) -> String {
    forwarded_for(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
