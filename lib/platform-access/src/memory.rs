//! In-memory stores for tests and local runs.
//!
//! [`MemorySessionStore`] emulates store-side TTL: an entry whose TTL has
//! elapsed is invisible to `get`. Entries written with
//! [`MemorySessionStore::insert_raw`] have no TTL, which lets tests present
//! a stale record to the session manager.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rim_core::{StoreError, UserId};
use rootcause::Report;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::session::{Session, SessionToken};
use crate::store::{SessionStore, SettingsRepository, UserRepository};
use crate::user::User;

struct Entry {
    session: Session,
    evict_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.evict_at.is_none_or(|at| now < at)
    }
}

/// Session store held in process memory.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<SessionToken, Entry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session without a TTL, bypassing expiry emulation.
    pub async fn insert_raw(&self, session: Session) {
        self.entries.write().await.insert(
            session.token().clone(),
            Entry {
                session,
                evict_at: None,
            },
        );
    }

    /// Number of entries held, including ones past their TTL.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if no entries are held.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), Report<StoreError>> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            session.token().clone(),
            Entry {
                session: session.clone(),
                evict_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, token: &SessionToken) -> Result<Option<Session>, Report<StoreError>> {
        let now = Utc::now();
        Ok(self
            .entries
            .read()
            .await
            .get(token)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.session.clone()))
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), Report<StoreError>> {
        self.entries.write().await.remove(token);
        Ok(())
    }

    async fn sessions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Session>, Report<StoreError>> {
        let now = Utc::now();
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now) && entry.session.user_id() == user_id)
            .map(|entry| entry.session.clone())
            .collect())
    }
}

/// User repository held in process memory.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<StoreError>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<User>, Report<StoreError>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.telegram_id() == telegram_id)
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<(), Report<StoreError>> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.telegram_id() == user.telegram_id() || u.id() == user.id())
        {
            return Err(StoreError::Conflict {
                details: format!("duplicate users.telegram_id {}", user.telegram_id()),
            }
            .into());
        }
        users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<(), Report<StoreError>> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.set_active(active);
                Ok(())
            }
            None => Err(StoreError::Query {
                details: format!("user {id} does not exist"),
            }
            .into()),
        }
    }
}

/// Settings held in process memory.
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsRepository for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>, Report<StoreError>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Report<StoreError>> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
