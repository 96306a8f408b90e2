//! Core domain types and utilities for the RIM corporate directory.
//!
//! This crate provides the identifiers, error handling foundation, and
//! validation primitives shared by the directory, the access core and the
//! server.

pub mod error;
pub mod id;
pub mod validation;

pub use error::{Result, StoreError};
pub use id::{ContactId, GroupId, ParseIdError, UserId};
pub use validation::{FieldError, ValidationErrors};
