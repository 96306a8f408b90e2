//! Session-bound CSRF tokens.
//!
//! A token is 16 random bytes hex-encoded (32 chars) followed by the first
//! 8 characters of the session token, 40 characters in total. Validation is
//! a pure function of the session token and the presented value; nothing is
//! stored server-side. The check binds a token to a session, it does not
//! keep the token secret from anyone who can read the session cookie.

use rand::RngCore;

use crate::session::SessionToken;

/// Header carrying the CSRF token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

const RANDOM_BYTES: usize = 16;
const RANDOM_HEX_LEN: usize = RANDOM_BYTES * 2;
const BINDING_LEN: usize = 8;

/// Length of every issued token.
pub const CSRF_TOKEN_LEN: usize = RANDOM_HEX_LEN + BINDING_LEN;

/// Issues a fresh token bound to the session.
#[must_use]
pub fn issue_token(session: &SessionToken) -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);

    let mut token = hex::encode(bytes);
    token.push_str(binding(session));
    token
}

/// Returns true if the presented token is bound to this session.
#[must_use]
pub fn validate_token(session: &SessionToken, presented: &str) -> bool {
    if presented.len() < CSRF_TOKEN_LEN {
        return false;
    }
    let expected = binding(session);
    if expected.len() < BINDING_LEN {
        return false;
    }
    presented
        .get(presented.len() - BINDING_LEN..)
        .is_some_and(|suffix| suffix == expected)
}

fn binding(session: &SessionToken) -> &str {
    let token = session.as_str();
    token.get(..BINDING_LEN).unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_has_expected_shape() {
        let session = SessionToken::from("abcdef0123456789abcdef0123456789");
        let token = issue_token(&session);
        assert_eq!(token.len(), CSRF_TOKEN_LEN);
        assert!(token[..32].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(token.ends_with("abcdef01"));
    }

    #[test]
    fn issued_token_validates_for_its_session() {
        let session = SessionToken::generate();
        let token = issue_token(&session);
        assert!(validate_token(&session, &token));
    }

    #[test]
    fn token_for_other_session_is_rejected() {
        let session = SessionToken::from("11111111aaaaaaaaaaaaaaaaaaaaaaaa");
        let other = SessionToken::from("22222222aaaaaaaaaaaaaaaaaaaaaaaa");
        let token = issue_token(&other);
        assert!(!validate_token(&session, &token));
    }

    #[test]
    fn short_token_is_rejected() {
        let session = SessionToken::generate();
        let token = issue_token(&session);
        assert!(!validate_token(&session, &token[1..]));
        assert!(!validate_token(&session, ""));
    }

    #[test]
    fn random_prefix_is_not_checked() {
        let session = SessionToken::from("0badc0de99999999999999999999999");
        let forged = format!("{}0badc0de", "z".repeat(32));
        assert!(validate_token(&session, &forged));
    }

    #[test]
    fn tokens_vary_per_issue() {
        let session = SessionToken::generate();
        assert_ne!(issue_token(&session), issue_token(&session));
    }

    #[test]
    fn non_ascii_token_does_not_panic() {
        let session = SessionToken::generate();
        let presented = "я".repeat(30);
        assert!(!validate_token(&session, &presented));
    }
}
