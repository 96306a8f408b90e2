//! Error types for the platform-access crate.
//!
//! - `SessionError`: a presented session token could not be resolved
//! - `LoginError`: a Telegram login attempt failed
//! - `SettingsError`: the persisted debug-mode setting could not be read or written
//!
//! Store failures arrive as `Report<StoreError>` and are flattened into the
//! `Store` variant of each enum so the HTTP layer can map them to 500.

use rim_core::StoreError;
use rootcause::Report;
use std::fmt;

/// Why a session token did not resolve to an active user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No such session, or its user is missing or inactive.
    NotFound,
    /// The session existed but its expiry has passed. The stale entry has
    /// been removed.
    Expired,
    /// The session store or user repository failed.
    Store { details: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "session not found"),
            Self::Expired => write!(f, "session has expired"),
            Self::Store { details } => write!(f, "session store error: {details}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<Report<StoreError>> for SessionError {
    fn from(report: Report<StoreError>) -> Self {
        Self::Store {
            details: report.to_string(),
        }
    }
}

/// Why a Telegram login attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// The claim failed verification, or the account is inactive.
    Rejected,
    /// A store failed while resolving the user or creating the session.
    Store { details: String },
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "telegram login rejected"),
            Self::Store { details } => write!(f, "login store error: {details}"),
        }
    }
}

impl std::error::Error for LoginError {}

impl From<Report<StoreError>> for LoginError {
    fn from(report: Report<StoreError>) -> Self {
        Self::Store {
            details: report.to_string(),
        }
    }
}

impl From<SessionError> for LoginError {
    fn from(err: SessionError) -> Self {
        Self::Store {
            details: err.to_string(),
        }
    }
}

/// Errors from the persisted system settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// A stored value is not a valid boolean.
    InvalidValue { key: String, value: String },
    /// The settings store failed.
    Store { details: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "setting '{key}' has invalid value '{value}'")
            }
            Self::Store { details } => write!(f, "settings store error: {details}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<Report<StoreError>> for SettingsError {
    fn from(report: Report<StoreError>) -> Self {
        Self::Store {
            details: report.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_display() {
        assert_eq!(SessionError::NotFound.to_string(), "session not found");
        assert!(SessionError::Expired.to_string().contains("expired"));
    }

    #[test]
    fn store_report_flattens_into_session_error() {
        let report: Report<StoreError> = StoreError::Unavailable {
            details: "connection reset".to_string(),
        }
        .into();
        match SessionError::from(report) {
            SessionError::Store { details } => assert!(details.contains("connection reset")),
            other => panic!("expected Store, got {other:?}"),
        }
    }

    #[test]
    fn settings_invalid_value_display() {
        let err = SettingsError::InvalidValue {
            key: "debug_mode".to_string(),
            value: "yes".to_string(),
        };
        assert!(err.to_string().contains("debug_mode"));
        assert!(err.to_string().contains("yes"));
    }

    #[test]
    fn session_store_failure_becomes_login_store_error() {
        let err = LoginError::from(SessionError::Store {
            details: "redis down".to_string(),
        });
        assert!(matches!(err, LoginError::Store { .. }));
    }
}
