//! Telegram login widget verification.
//!
//! The widget signs its payload with HMAC-SHA256. The key is the SHA-256
//! digest of the bot token and the message is the "data-check string":
//! every non-empty field except `hash`, formatted as `key=value`, sorted by
//! key and joined with `\n`. Values are used verbatim, not URL-encoded.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rim_core::ValidationErrors;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// How old a claim may be, in seconds, before it is refused.
pub const MAX_CLAIM_AGE_SECS: i64 = 24 * 60 * 60;

/// An unverified login payload posted by the Telegram widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramClaim {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Unix timestamp at which Telegram issued the claim.
    pub auth_date: i64,
    pub hash: String,
}

impl TelegramClaim {
    /// Checks the claim is structurally usable before verification.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.id <= 0 {
            errors.push("id", "is required");
        }
        if self.auth_date <= 0 {
            errors.push("auth_date", "is required");
        }
        if self.hash.is_empty() {
            errors.push("hash", "is required");
        }
        errors.into_result()
    }

    /// Builds the canonical string the widget signed.
    #[must_use]
    pub fn data_check_string(&self) -> String {
        let mut fields: Vec<(&str, String)> = vec![
            ("auth_date", self.auth_date.to_string()),
            ("id", self.id.to_string()),
        ];
        let optional = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("photo_url", &self.photo_url),
            ("username", &self.username),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                fields.push((key, value.to_string()));
            }
        }
        fields.sort_by(|a, b| a.0.cmp(b.0));

        fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Length of a hex-encoded HMAC-SHA256 digest.
const SIGNATURE_HEX_LEN: usize = 64;

fn is_lowercase_hex_digest(hash: &str) -> bool {
    hash.len() == SIGNATURE_HEX_LEN
        && hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Verifies Telegram widget claims against one bot token.
#[derive(Clone)]
pub struct TelegramVerifier {
    secret_key: [u8; 32],
}

impl std::fmt::Debug for TelegramVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramVerifier").finish_non_exhaustive()
    }
}

impl TelegramVerifier {
    /// Derives the signing key from the bot token.
    #[must_use]
    pub fn new(bot_token: &str) -> Self {
        Self {
            secret_key: Sha256::digest(bot_token.as_bytes()).into(),
        }
    }

    /// Verifies a claim against the current time.
    #[must_use]
    pub fn verify(&self, claim: &TelegramClaim) -> bool {
        self.verify_at(claim, Utc::now())
    }

    /// Verifies the claim's signature and that it was issued no more than
    /// [`MAX_CLAIM_AGE_SECS`] before `now`.
    #[must_use]
    pub fn verify_at(&self, claim: &TelegramClaim, now: DateTime<Utc>) -> bool {
        // The signature must be the exact lowercase hex digest; decoding
        // alone would also accept its uppercase spellings.
        if !is_lowercase_hex_digest(&claim.hash) {
            return false;
        }
        let Ok(presented) = hex::decode(&claim.hash) else {
            return false;
        };
        let Some(mut mac) = self.mac() else {
            return false;
        };
        mac.update(claim.data_check_string().as_bytes());
        if mac.verify_slice(&presented).is_err() {
            return false;
        }

        let Some(issued_at) = DateTime::from_timestamp(claim.auth_date, 0) else {
            return false;
        };
        now - issued_at <= Duration::seconds(MAX_CLAIM_AGE_SECS)
    }

    /// Computes the hex signature the widget would attach to this claim.
    #[must_use]
    pub fn sign(&self, claim: &TelegramClaim) -> String {
        self.mac()
            .map(|mut mac| {
                mac.update(claim.data_check_string().as_bytes());
                hex::encode(mac.finalize().into_bytes())
            })
            .unwrap_or_default()
    }

    fn mac(&self) -> Option<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.secret_key).ok()
    }
}
