//! Sessions for authenticated browsers.
//!
//! A session is an opaque random token mapped to its owner and an absolute
//! expiry. The session store is the only holder of session state; nothing is
//! cached in process memory between requests.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use rim_core::UserId;
use std::fmt;

/// Number of random bytes in a session token.
const TOKEN_BYTES: usize = 16;

/// Opaque bearer credential identifying one session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a fresh token from 128 bits of OS randomness, hex-encoded.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short prefix that is safe to log.
    #[must_use]
    pub fn log_prefix(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

// Tokens are credentials, keep them out of debug output.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({}…)", self.log_prefix())
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One authenticated browser session.
///
/// Serialized as `{token, user_id, created_at, expired_at}` in the session
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: SessionToken,
    user_id: UserId,
    created_at: DateTime<Utc>,
    expired_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session with a fresh token, valid for `ttl` from now.
    #[must_use]
    pub fn new(user_id: UserId, ttl: Duration) -> Self {
        let now = Utc::now();
        Self::with_times(SessionToken::generate(), user_id, now, now + ttl)
    }

    /// Creates a session with explicit fields, e.g. when reading a stored
    /// record or building an already-expired session in tests.
    #[must_use]
    pub fn with_times(
        token: SessionToken,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            user_id,
            created_at,
            expired_at,
        }
    }

    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expired_at
    }

    /// Returns true once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expired_at <= now
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time left before expiry, zero if already expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        (self.expired_at - Utc::now()).max(Duration::zero())
    }
}
