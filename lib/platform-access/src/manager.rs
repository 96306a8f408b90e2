//! Session issuance, resolution and revocation.

use chrono::{Duration, Utc};
use rim_core::UserId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::session::{Session, SessionToken};
use crate::store::{SessionStore, UserRepository};
use crate::user::User;

/// Default session lifetime: seven days.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 7 * 24;

/// Tunable session behaviour.
///
/// The default allows unlimited concurrent sessions per user and never
/// reactivates a deactivated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Lifetime of a new session.
    pub ttl: Duration,
    /// Keep at most this many sessions per user, evicting the oldest.
    pub max_sessions_per_user: Option<usize>,
    /// Re-enable an inactive user when they log in again.
    pub reactivate_inactive_users: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            max_sessions_per_user: None,
            reactivate_inactive_users: false,
        }
    }
}

/// Issues, resolves and revokes sessions against the session store.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserRepository>,
    policy: SessionPolicy,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserRepository>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            sessions,
            users,
            policy,
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Mints a new session for the user. Existing sessions stay valid unless
    /// a per-user cap is configured.
    pub async fn create_session(&self, user_id: UserId) -> Result<Session, SessionError> {
        let session = Session::new(user_id, self.policy.ttl);
        self.sessions.put(&session, self.policy.ttl).await?;

        info!(
            user_id = %user_id,
            session = session.token().log_prefix(),
            expires_at = %session.expires_at(),
            "session created"
        );

        if let Some(max) = self.policy.max_sessions_per_user {
            self.evict_excess(user_id, session.token(), max).await?;
        }
        Ok(session)
    }

    /// Resolves a token to its session and active user.
    ///
    /// An expired entry still present in the store is deleted before
    /// `Expired` is returned. A missing or inactive user is reported as
    /// `NotFound` so account state is not revealed.
    pub async fn resolve(&self, token: &SessionToken) -> Result<(Session, User), SessionError> {
        let Some(session) = self.sessions.get(token).await? else {
            debug!(session = token.log_prefix(), "session not found");
            return Err(SessionError::NotFound);
        };

        if session.is_expired_at(Utc::now()) {
            warn!(
                session = token.log_prefix(),
                expired_at = %session.expires_at(),
                "store returned an expired session, deleting it"
            );
            self.sessions.delete(token).await?;
            return Err(SessionError::Expired);
        }

        match self.users.find_by_id(session.user_id()).await? {
            Some(user) if user.is_active() => Ok((session, user)),
            Some(user) => {
                warn!(user_id = %user.id(), "session belongs to an inactive user");
                Err(SessionError::NotFound)
            }
            None => {
                warn!(user_id = %session.user_id(), "session belongs to an unknown user");
                Err(SessionError::NotFound)
            }
        }
    }

    /// Deletes the session. Revoking an unknown token succeeds.
    pub async fn revoke(&self, token: &SessionToken) -> Result<(), SessionError> {
        self.sessions.delete(token).await?;
        info!(session = token.log_prefix(), "session revoked");
        Ok(())
    }

    async fn evict_excess(
        &self,
        user_id: UserId,
        keep: &SessionToken,
        max: usize,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.sessions_for_user(user_id).await?;
        if sessions.len() <= max {
            return Ok(());
        }

        // Newest first, with the session just minted always kept.
        sessions.sort_by(|a, b| {
            (b.token() == keep)
                .cmp(&(a.token() == keep))
                .then(b.created_at().cmp(&a.created_at()))
        });
        for stale in sessions.iter().skip(max.max(1)) {
            self.sessions.delete(stale.token()).await?;
            info!(
                user_id = %user_id,
                session = stale.token().log_prefix(),
                "session evicted by per-user cap"
            );
        }
        Ok(())
    }
}
