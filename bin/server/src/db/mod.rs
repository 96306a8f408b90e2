//! Postgres repositories for the RIM server.
//!
//! This module provides data access for:
//! - User accounts
//! - Directory contacts, groups and memberships
//! - System settings

pub mod directory;
pub mod settings;
pub mod users;

pub use directory::PgDirectory;
pub use settings::PgSettings;
pub use users::PgUserRepository;

use rim_core::StoreError;
use std::fmt;

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Classifies a sqlx error into the shared store taxonomy.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict {
                details: db.message().to_string(),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable {
                details: err.to_string(),
            }
        }
        _ => StoreError::Query {
            details: err.to_string(),
        },
    }
}

/// Reports a stored value that does not parse back into its domain type.
pub(crate) fn decode_error(column: &str, value: &str, reason: impl fmt::Display) -> StoreError {
    StoreError::Serialization {
        details: format!("invalid {column} '{value}': {reason}"),
    }
}
