//! Storage traits for contacts and groups.
//!
//! Implementations return `Report<StoreError>` so the backend's own error
//! text travels with the failure. Lookups return `Ok(None)` for a missing
//! record and reserve `Err` for genuine storage failures.

use async_trait::async_trait;
use rim_core::{ContactId, GroupId, StoreError};
use rootcause::Report;

use crate::contact::Contact;
use crate::group::Group;

/// Persistent storage for contacts and their group memberships.
///
/// Every returned [`Contact`] has its `groups` populated.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Inserts a contact together with its group memberships.
    async fn insert(&self, contact: &Contact) -> Result<(), Report<StoreError>>;

    /// Finds a contact by ID.
    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, Report<StoreError>>;

    /// Finds a contact by email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, Report<StoreError>>;

    /// Finds a contact by phone number.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>, Report<StoreError>>;

    /// Finds a contact by numeric Telegram user ID.
    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Contact>, Report<StoreError>>;

    /// Lists every contact, oldest first.
    async fn list(&self) -> Result<Vec<Contact>, Report<StoreError>>;

    /// Writes all fields and replaces the group memberships with
    /// `contact.groups` in a single transaction.
    async fn update(&self, contact: &Contact) -> Result<(), Report<StoreError>>;

    /// Deletes a contact. Returns false if it did not exist.
    async fn delete(&self, id: ContactId) -> Result<bool, Report<StoreError>>;

    /// Adds one membership. Adding an existing membership is a no-op.
    async fn add_to_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), Report<StoreError>>;

    /// Removes one membership. Removing a missing membership is a no-op.
    async fn remove_from_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), Report<StoreError>>;
}

/// Persistent storage for groups.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn insert(&self, group: &Group) -> Result<(), Report<StoreError>>;

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, Report<StoreError>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Group>, Report<StoreError>>;

    /// Lists every group, ordered by name.
    async fn list(&self) -> Result<Vec<Group>, Report<StoreError>>;

    async fn update(&self, group: &Group) -> Result<(), Report<StoreError>>;

    /// Deletes a group and its memberships. Returns false if it did not exist.
    async fn delete(&self, id: GroupId) -> Result<bool, Report<StoreError>>;
}
