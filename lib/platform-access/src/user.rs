//! User accounts.
//!
//! A user is created lazily at the first successful Telegram login. The
//! Telegram ID is unique and never changes. Users are never deleted, only
//! deactivated.

use chrono::{DateTime, Utc};
use rim_core::{ContactId, UserId};
use serde::{Deserialize, Serialize};

/// An account identified by its Telegram user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    telegram_id: i64,
    is_active: bool,
    /// Directory entry linked at first login, if one matched.
    contact_id: Option<ContactId>,
    created_at: DateTime<Utc>,
}

impl User {
    /// Creates an active user for a previously unseen Telegram ID.
    #[must_use]
    pub fn new(telegram_id: i64, contact_id: Option<ContactId>) -> Self {
        Self {
            id: UserId::new(),
            telegram_id,
            is_active: true,
            contact_id,
            created_at: Utc::now(),
        }
    }

    /// Reconstitutes a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: UserId,
        telegram_id: i64,
        is_active: bool,
        contact_id: Option<ContactId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            telegram_id,
            is_active,
            contact_id,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn telegram_id(&self) -> i64 {
        self.telegram_id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn contact_id(&self) -> Option<ContactId> {
        self.contact_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Sets the active flag.
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}
