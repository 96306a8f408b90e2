//! Error types for directory operations.

use rim_core::{StoreError, ValidationErrors};
use rootcause::Report;
use std::fmt;

/// Errors from the directory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The contact or group does not exist.
    NotFound { entity: &'static str, id: String },
    /// A unique field is already taken by another record.
    Conflict { field: &'static str },
    /// The request failed validation.
    Invalid(ValidationErrors),
    /// A referenced group does not exist.
    GroupNotFound { id: String },
    /// The contact is not a member of the group.
    NotMember { contact_id: String, group_id: String },
    /// The backing store failed.
    Store { details: String },
}

impl DirectoryError {
    pub(crate) fn contact_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: "contact",
            id: id.to_string(),
        }
    }

    pub(crate) fn group_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: "group",
            id: id.to_string(),
        }
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} '{id}' not found"),
            Self::Conflict { field } => write!(f, "{field} is already taken"),
            Self::Invalid(errors) => write!(f, "validation failed: {errors}"),
            Self::GroupNotFound { id } => write!(f, "group '{id}' not found"),
            Self::NotMember {
                contact_id,
                group_id,
            } => write!(f, "contact '{contact_id}' is not a member of group '{group_id}'"),
            Self::Store { details } => write!(f, "directory store error: {details}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<ValidationErrors> for DirectoryError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Invalid(errors)
    }
}

impl From<Report<StoreError>> for DirectoryError {
    fn from(report: Report<StoreError>) -> Self {
        Self::Store {
            details: report.to_string(),
        }
    }
}
