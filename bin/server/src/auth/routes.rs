//! Authentication routes for Telegram login, logout and the current user.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use rim_core::{ContactId, UserId};
use rim_directory::{Contact, ContactChanges};
use rim_platform_access::{Session, TelegramClaim, csrf};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::info;

use super::{RequireAuth, SESSION_COOKIE, session_token};
use crate::app::AppState;
use crate::error::{ApiError, clear_session_cookie, json_body};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: UserId,
    pub telegram_id: i64,
    pub is_active: bool,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<ContactId>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

/// Verifies a Telegram login widget payload and starts a session.
pub async fn telegram(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<TelegramClaim>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let claim = json_body(payload)?;
    claim.validate()?;

    let (session, user) = state.auth.login(&claim).await?;
    info!(user_id = %user.id(), telegram_id = user.telegram_id(), "user logged in");

    let cookie = session_cookie(&session, state.secure_cookies);
    let body = LoginResponse {
        session_token: session.token().as_str().to_string(),
        expires_at: session.expires_at(),
    };
    Ok((jar.add(cookie), Json(body)))
}

fn session_cookie(session: &Session, secure: bool) -> Cookie<'static> {
    let remaining = session.remaining();
    Cookie::build((SESSION_COOKIE, session.token().as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(TimeDuration::seconds(remaining.num_seconds()))
        .expires(OffsetDateTime::from_unix_timestamp(session.expires_at().timestamp()).ok())
        .build()
}

/// Returns the caller's account, privilege and linked contact.
pub async fn me(
    State(state): State<Arc<AppState>>,
    RequireAuth(auth): RequireAuth,
) -> Result<Json<MeResponse>, ApiError> {
    let user = auth.user();

    let contact = state
        .directory
        .find_contact_by_telegram_id(user.telegram_id())
        .await?;

    Ok(Json(MeResponse {
        id: user.id(),
        telegram_id: user.telegram_id(),
        is_active: user.is_active(),
        is_admin: auth.is_admin(),
        contact_id: user.contact_id(),
        created_at: user.created_at(),
        contact,
    }))
}

/// Revokes the presented session and clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let token = session_token(&headers).ok_or(ApiError::Unauthorized("authentication required"))?;

    state.auth.sessions().revoke(&token).await?;
    info!(session = token.log_prefix(), "session revoked");

    Ok((
        jar.add(clear_session_cookie(state.secure_cookies)),
        Json(json!({"message": "logged out"})),
    ))
}

/// Issues a CSRF token bound to the caller's session.
pub async fn csrf_token(RequireAuth(auth): RequireAuth) -> Json<serde_json::Value> {
    Json(json!({"csrf_token": csrf::issue_token(auth.session().token())}))
}

/// Lets a user edit the contact linked to their Telegram account.
///
/// Group membership and the Telegram ID itself stay under administrator
/// control and are ignored here.
pub async fn update_my_contact(
    State(state): State<Arc<AppState>>,
    RequireAuth(auth): RequireAuth,
    payload: Result<Json<ContactChanges>, JsonRejection>,
) -> Result<Json<Contact>, ApiError> {
    let mut changes = json_body(payload)?;
    changes.group_ids = None;
    changes.telegram_id = None;

    let telegram_id = auth.user().telegram_id();
    let contact = state
        .directory
        .find_contact_by_telegram_id(telegram_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("contact not found".to_string()))?;

    let updated = state.directory.update_contact(contact.id, changes).await?;
    info!(user_id = %auth.user_id(), contact_id = %updated.id, "user updated own contact");
    Ok(Json(updated))
}
