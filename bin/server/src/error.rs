//! HTTP error responses.
//!
//! Every failure leaves the server as `{"error": "<message>"}`, with a
//! `fields` array added for validation failures. Internal details are
//! logged here and never sent to the client.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use rim_core::{FieldError, ValidationErrors};
use rim_directory::DirectoryError;
use rim_platform_access::{LoginError, SessionError, SettingsError};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::auth::SESSION_COOKIE;

/// An error returned from a handler or extractor.
#[derive(Debug)]
pub enum ApiError {
    /// The request body or path could not be parsed.
    BadRequest(String),
    /// The request failed field validation.
    Validation(ValidationErrors),
    /// No credentials, or credentials that were rejected.
    Unauthorized(&'static str),
    /// The presented session is unknown or expired. The session cookie is
    /// cleared, marked `Secure` when `secure_cookies` is set.
    InvalidSession { secure_cookies: bool },
    /// The caller is known but not allowed.
    Forbidden(&'static str),
    /// The addressed record does not exist.
    NotFound(String),
    /// A unique field is already taken.
    Conflict(String),
    /// Something failed on the server side.
    Internal,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldError]>,
}

impl ApiError {
    /// Sets whether a clearing cookie sent with this error is `Secure`.
    #[must_use]
    pub fn with_cookie_security(self, secure: bool) -> Self {
        match self {
            Self::InvalidSession { .. } => Self::InvalidSession {
                secure_cookies: secure,
            },
            other => other,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::InvalidSession { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) | Self::Conflict(message) => {
                message
            }
            Self::Validation(_) => "validation failed",
            Self::Unauthorized(message) | Self::Forbidden(message) => message,
            Self::InvalidSession { .. } => "invalid or expired session",
            Self::Internal => "internal server error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status().as_u16(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message(),
            fields: match &self {
                Self::Validation(errors) => Some(errors.errors()),
                _ => None,
            },
        };
        let mut response = (self.status(), Json(body)).into_response();

        if let Self::InvalidSession { secure_cookies } = self {
            if let Ok(value) = clear_session_cookie(secure_cookies).to_string().parse() {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
        }
        response
    }
}

/// An already-expired cookie that makes the browser drop its session token.
/// Carries the same attributes as the cookie set at login.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Unwraps a JSON body, turning axum's rejection into a JSON 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::BadRequest("invalid request body".to_string())
    })
}

/// Parses a path identifier such as `cnt_01H...`.
pub fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {entity} id")))
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound { .. } | DirectoryError::GroupNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            DirectoryError::Conflict { .. } => Self::Conflict(err.to_string()),
            DirectoryError::Invalid(errors) => Self::Validation(errors),
            DirectoryError::NotMember { .. } => Self::BadRequest(err.to_string()),
            DirectoryError::Store { details } => {
                tracing::error!(error = %details, "directory store error");
                Self::Internal
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound | SessionError::Expired => Self::InvalidSession {
                secure_cookies: true,
            },
            SessionError::Store { details } => {
                tracing::error!(error = %details, "session store error");
                Self::Internal
            }
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::Rejected => Self::Unauthorized("invalid telegram authentication"),
            LoginError::Store { details } => {
                tracing::error!(error = %details, "login failed");
                Self::Internal
            }
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        tracing::error!(error = %err, "system settings error");
        Self::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.push("email", "must be a valid email address");
        let response = ApiError::from(errors).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation failed");
        assert_eq!(body["fields"][0]["field"], "email");
    }

    #[tokio::test]
    async fn invalid_session_clears_cookie() {
        let response = ApiError::from(SessionError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("session_token=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("1970"));
    }

    #[test]
    fn clearing_cookie_follows_cookie_security_setting() {
        let cookie = clear_session_cookie(false);
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));

        let err = ApiError::from(SessionError::NotFound).with_cookie_security(false);
        assert!(matches!(
            err,
            ApiError::InvalidSession {
                secure_cookies: false
            }
        ));
    }

    #[tokio::test]
    async fn store_details_are_not_leaked() {
        let response = ApiError::from(DirectoryError::Store {
            details: "password authentication failed for user rim".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({"error": "internal server error"}));
    }

    #[test]
    fn directory_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(DirectoryError::Conflict { field: "email" }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DirectoryError::GroupNotFound {
                id: "grp_1".to_string()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LoginError::Rejected).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
