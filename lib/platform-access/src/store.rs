//! Storage seams for the access layer.
//!
//! Sessions live in a TTL-capable key-value store, users and settings in the
//! relational store, and directory entries are reached through the single
//! [`DirectoryLookup`] capability.

use async_trait::async_trait;
use chrono::Duration;
use rim_core::{StoreError, UserId};
use rim_directory::{Contact, ContactRepository};
use rootcause::Report;

use crate::session::{Session, SessionToken};
use crate::user::User;

/// Key-value storage for sessions.
///
/// Each operation is a single atomic round-trip. Entries should disappear
/// on their own once the TTL passed to [`SessionStore::put`] elapses.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Writes a session under its token with the given time-to-live.
    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), Report<StoreError>>;

    /// Reads a session. Returns `Ok(None)` if the token is unknown.
    async fn get(&self, token: &SessionToken) -> Result<Option<Session>, Report<StoreError>>;

    /// Deletes a session. Deleting an unknown token is not an error.
    async fn delete(&self, token: &SessionToken) -> Result<(), Report<StoreError>>;

    /// Lists the live sessions of one user.
    async fn sessions_for_user(&self, user_id: UserId)
    -> Result<Vec<Session>, Report<StoreError>>;
}

/// Persistent storage for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<StoreError>>;

    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<User>, Report<StoreError>>;

    /// Inserts a new user. Fails with `StoreError::Conflict` if the
    /// Telegram ID is already registered.
    async fn create(&self, user: &User) -> Result<(), Report<StoreError>>;

    async fn set_active(&self, id: UserId, active: bool) -> Result<(), Report<StoreError>>;
}

/// Persistent key/value system settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Report<StoreError>>;

    /// Inserts or overwrites a setting.
    async fn set(&self, key: &str, value: &str) -> Result<(), Report<StoreError>>;
}

/// Live lookup of a directory entry by Telegram user ID.
///
/// Never cached: group membership and group names may change between calls.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Contact>, Report<StoreError>>;
}

#[async_trait]
impl<T> DirectoryLookup for T
where
    T: ContactRepository + ?Sized,
{
    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Contact>, Report<StoreError>> {
        ContactRepository::find_by_telegram_id(self, telegram_id).await
    }
}
