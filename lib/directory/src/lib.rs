//! Contacts, groups and their memberships.
//!
//! The directory is the collaborator the access layer consults for
//! first-login linking and administrator group membership.

pub mod contact;
pub mod error;
pub mod group;
pub mod memory;
pub mod repository;
pub mod service;

pub use contact::{Contact, ContactChanges, NewContact, Printer, Transport};
pub use error::DirectoryError;
pub use group::{Group, GroupName};
pub use memory::MemoryDirectory;
pub use repository::{ContactRepository, GroupRepository};
pub use service::DirectoryService;
