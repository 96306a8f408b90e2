//! Redis-backed session store.
//!
//! Sessions are stored in Redis with:
//! - **Primary key**: `session:{token}` → JSON `{token, user_id, created_at, expired_at}`
//! - **User index**: `user:{user_id}:sessions` (Set) → tokens of that user
//! - **TTL**: the session's lifetime on the primary key; the index outlives
//!   it by a day and is pruned lazily when listed

use async_trait::async_trait;
use chrono::Duration;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use rim_core::{StoreError, UserId};
use rim_platform_access::{Session, SessionStore, SessionToken};
use rootcause::Report;
use tracing::{debug, warn};

/// Extra lifetime of the per-user index beyond the session TTL.
const INDEX_GRACE_SECS: i64 = 24 * 60 * 60;

/// Session store over a shared Redis connection manager.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    /// Connects to Redis.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or Redis is unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self, Report<StoreError>> {
        let client = redis::Client::open(redis_url).map_err(|e| StoreError::Unavailable {
            details: format!("invalid redis url: {e}"),
        })?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(redis_error)?;
        Ok(Self { conn })
    }

    fn session_key(token: &SessionToken) -> String {
        format!("session:{}", token.as_str())
    }

    fn user_sessions_key(user_id: UserId) -> String {
        format!("user:{user_id}:sessions")
    }
}

/// Decodes a stored session, logging and discarding payloads that no
/// longer match the session schema.
fn decode_session(token: &SessionToken, payload: &str) -> Option<Session> {
    match serde_json::from_str(payload) {
        Ok(session) => Some(session),
        Err(err) => {
            warn!(session = token.log_prefix(), error = %err, "undecodable session entry");
            None
        }
    }
}

fn redis_error(err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        StoreError::Unavailable {
            details: err.to_string(),
        }
    } else {
        StoreError::Query {
            details: err.to_string(),
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), Report<StoreError>> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(session).map_err(|e| StoreError::Serialization {
            details: e.to_string(),
        })?;
        let ttl_secs = u64::try_from(ttl.num_seconds().max(1)).unwrap_or(1);
        let index_ttl = ttl.num_seconds().max(1) + INDEX_GRACE_SECS;

        let _: () = redis::pipe()
            .atomic()
            .set_ex(Self::session_key(session.token()), payload, ttl_secs)
            .sadd(
                Self::user_sessions_key(session.user_id()),
                session.token().as_str(),
            )
            .ignore()
            .expire(Self::user_sessions_key(session.user_id()), index_ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn get(&self, token: &SessionToken) -> Result<Option<Session>, Report<StoreError>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(Self::session_key(token))
            .await
            .map_err(redis_error)?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        match decode_session(token, &payload) {
            Some(session) => Ok(Some(session)),
            None => {
                // An undecodable entry can never resolve; drop it.
                let removed: redis::RedisResult<()> = conn.del(Self::session_key(token)).await;
                if let Err(err) = removed {
                    warn!(session = token.log_prefix(), error = %err, "failed to drop corrupt session");
                }
                Ok(None)
            }
        }
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), Report<StoreError>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(Self::session_key(token))
            .await
            .map_err(redis_error)?;

        let _: () = conn
            .del(Self::session_key(token))
            .await
            .map_err(redis_error)?;

        // The owner is only needed to tidy the index, which is also pruned
        // lazily, so a payload that does not decode is not an error here.
        if let Some(session) = payload.and_then(|payload| decode_session(token, &payload)) {
            let removed: redis::RedisResult<()> = conn
                .srem(Self::user_sessions_key(session.user_id()), token.as_str())
                .await;
            if let Err(err) = removed {
                warn!(user_id = %session.user_id(), error = %err, "failed to update session index");
            }
        }
        Ok(())
    }

    async fn sessions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Session>, Report<StoreError>> {
        let mut conn = self.conn.clone();
        let index_key = Self::user_sessions_key(user_id);
        let tokens: Vec<String> = conn.smembers(&index_key).await.map_err(redis_error)?;

        let mut sessions = Vec::with_capacity(tokens.len());
        let mut dead = 0usize;
        for raw in tokens {
            let token = SessionToken::from(raw);
            match self.get(&token).await? {
                Some(session) => sessions.push(session),
                None => {
                    let removed: redis::RedisResult<()> =
                        conn.srem(&index_key, token.as_str()).await;
                    if let Err(err) = removed {
                        warn!(user_id = %user_id, error = %err, "failed to prune session index");
                    }
                    dead += 1;
                }
            }
        }

        if dead > 0 {
            debug!(user_id = %user_id, pruned = dead, "pruned dead session references");
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_session_decodes() {
        let session = Session::new(UserId::new(), Duration::hours(1));
        let payload = serde_json::to_string(&session).unwrap();
        assert_eq!(decode_session(session.token(), &payload), Some(session));
    }

    #[test]
    fn corrupt_payload_decodes_to_nothing() {
        let token = SessionToken::from("0123456789abcdef");
        assert_eq!(decode_session(&token, "garbage"), None);
        assert_eq!(decode_session(&token, r#"{"token":"0123"}"#), None);
    }

    #[test]
    fn keys_follow_layout() {
        let token = SessionToken::from("abc");
        assert_eq!(RedisSessionStore::session_key(&token), "session:abc");
        let user_id = UserId::new();
        assert_eq!(
            RedisSessionStore::user_sessions_key(user_id),
            format!("user:{user_id}:sessions")
        );
    }
}
