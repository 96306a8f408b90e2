//! Authentication extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;
use rim_platform_access::{AuthenticatedUser, SessionToken};
use std::sync::Arc;
use tracing::warn;

use super::SESSION_COOKIE;
use crate::app::AppState;
use crate::error::ApiError;

/// Returns the session token presented with a request. The cookie is
/// preferred; `Authorization: Bearer <token>` is accepted as a fallback.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(SessionToken::from(cookie.value()));
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(SessionToken::from)
}

/// Extractor for requiring an authenticated user.
///
/// Rejects with 401 if no session is presented, and with 401 plus a
/// clearing cookie if the session is unknown, expired or belongs to an
/// inactive user.
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let token =
            session_token(&parts.headers).ok_or(ApiError::Unauthorized("authentication required"))?;

        let (session, user) = app_state
            .auth
            .sessions()
            .resolve(&token)
            .await
            .map_err(|err| ApiError::from(err).with_cookie_security(app_state.secure_cookies))?;
        let grant = app_state.gate.evaluate(user.id()).await;

        Ok(RequireAuth(AuthenticatedUser::new(session, user, grant)))
    }
}

/// Extractor for optionally getting the authenticated user.
///
/// Returns None if no session, or an unknown or expired one, is presented.
/// Store failures still reject the request.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match RequireAuth::from_request_parts(parts, state).await {
            Ok(RequireAuth(user)) => Ok(OptionalAuth(Some(user))),
            Err(ApiError::Unauthorized(_) | ApiError::InvalidSession { .. }) => {
                Ok(OptionalAuth(None))
            }
            Err(err) => Err(err),
        }
    }
}

/// Extractor for requiring an administrator, or any authenticated user
/// while debug mode is on.
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            warn!(user_id = %user.user_id(), "admin rights required and debug mode is off");
            return Err(ApiError::Forbidden("admin rights required"));
        }

        Ok(RequireAdmin(user))
    }
}
