//! Error handling foundation for the RIM directory.
//!
//! This module provides the `Result` type alias using rootcause and the
//! `StoreError` taxonomy shared by every persistence adapter. Domain crates
//! define their own error types and map store reports into them at their
//! boundary.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context via `.context()` as errors propagate.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Errors raised by storage adapters (relational database, session store).
///
/// Adapters return `Report<StoreError>` so the original driver error text
/// travels with the report while callers only need to match on the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or the connection failed mid-call.
    Unavailable { details: String },
    /// A query or command was rejected by the backend.
    Query { details: String },
    /// A unique constraint was violated.
    Conflict { details: String },
    /// A stored value could not be encoded or decoded.
    Serialization { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "store unavailable: {details}"),
            Self::Query { details } => write!(f, "store query failed: {details}"),
            Self::Conflict { details } => write!(f, "store conflict: {details}"),
            Self::Serialization { details } => {
                write!(f, "store serialization failed: {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }

    #[test]
    fn store_error_display_includes_details() {
        let err = StoreError::Query {
            details: "relation \"users\" does not exist".to_string(),
        };
        assert!(err.to_string().contains("query failed"));
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn store_error_converts_into_report() {
        let result: Result<(), StoreError> = Err(StoreError::Unavailable {
            details: "connection refused".to_string(),
        }
        .into());
        let err = result.expect_err("should be an error");
        assert!(err.to_string().contains("connection refused"));
    }
}
