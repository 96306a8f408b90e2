//! Telegram login and the authenticated-request context.
//!
//! - `Authenticator`: turns a verified Telegram claim into a user and session
//! - `AuthenticatedUser`: what handlers see after a session resolves

use chrono::Utc;
use rim_core::UserId;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::LoginError;
use crate::gate::AccessGrant;
use crate::manager::SessionManager;
use crate::session::Session;
use crate::store::{DirectoryLookup, UserRepository};
use crate::telegram::{TelegramClaim, TelegramVerifier};
use crate::user::User;

/// An authenticated request context.
///
/// Privilege is decided per request by the authorization gate and carried
/// here so handlers never re-derive it.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    session: Session,
    user: User,
    grant: Option<AccessGrant>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new(session: Session, user: User, grant: Option<AccessGrant>) -> Self {
        Self {
            session,
            user,
            grant,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user.id()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// How administrator rights were granted, if they were.
    #[must_use]
    pub fn grant(&self) -> Option<AccessGrant> {
        self.grant
    }

    /// Returns true if the user has administrator rights for this request.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.grant.is_some()
    }
}

/// Telegram login flow.
#[derive(Clone)]
pub struct Authenticator {
    verifier: TelegramVerifier,
    users: Arc<dyn UserRepository>,
    directory: Arc<dyn DirectoryLookup>,
    sessions: SessionManager,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        verifier: TelegramVerifier,
        users: Arc<dyn UserRepository>,
        directory: Arc<dyn DirectoryLookup>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            verifier,
            users,
            directory,
            sessions,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Verifies the claim, finds or creates the user and issues a session.
    ///
    /// A first login links the new user to the directory entry carrying the
    /// same Telegram ID, if one exists. Inactive users are rejected unless
    /// the session policy reactivates them.
    pub async fn login(&self, claim: &TelegramClaim) -> Result<(Session, User), LoginError> {
        self.login_at(claim, Utc::now()).await
    }

    pub(crate) async fn login_at(
        &self,
        claim: &TelegramClaim,
        now: chrono::DateTime<Utc>,
    ) -> Result<(Session, User), LoginError> {
        if claim.validate().is_err() || !self.verifier.verify_at(claim, now) {
            warn!(telegram_id = claim.id, "invalid telegram authentication");
            return Err(LoginError::Rejected);
        }

        let mut user = match self.users.find_by_telegram_id(claim.id).await? {
            Some(user) => user,
            None => self.register(claim.id).await?,
        };

        if !user.is_active() {
            if !self.sessions.policy().reactivate_inactive_users {
                warn!(user_id = %user.id(), "login attempt by inactive user");
                return Err(LoginError::Rejected);
            }
            self.users.set_active(user.id(), true).await?;
            user.set_active(true);
            info!(user_id = %user.id(), "inactive user reactivated on login");
        }

        let session = self.sessions.create_session(user.id()).await?;
        info!(
            user_id = %user.id(),
            telegram_id = claim.id,
            "user authenticated"
        );
        Ok((session, user))
    }

    async fn register(&self, telegram_id: i64) -> Result<User, LoginError> {
        let contact = self
            .directory
            .find_by_telegram_id(telegram_id)
            .await
            .map_err(|report| {
                error!(telegram_id, error = %report, "contact lookup failed during login");
                LoginError::from(report)
            })?;
        if contact.is_none() {
            debug!(telegram_id, "no directory entry to link on first login");
        }

        let user = User::new(telegram_id, contact.map(|c| c.id));
        match self.users.create(&user).await {
            Ok(()) => {
                info!(user_id = %user.id(), telegram_id, "new user created");
                Ok(user)
            }
            Err(report) => {
                // A concurrent first login may have won the insert.
                match self.users.find_by_telegram_id(telegram_id).await? {
                    Some(existing) => Ok(existing),
                    None => {
                        error!(telegram_id, error = %report, "failed to create user");
                        Err(LoginError::from(report))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SessionPolicy;
    use crate::memory::{MemorySessionStore, MemoryUserRepository};
    use rim_directory::{DirectoryService, MemoryDirectory, NewContact};

    const BOT_TOKEN: &str = "123456:test-bot-token";

    struct Fixture {
        auth: Authenticator,
        users: Arc<MemoryUserRepository>,
        directory: DirectoryService,
    }

    fn fixture(policy: SessionPolicy) -> Fixture {
        let users = Arc::new(MemoryUserRepository::new());
        let store = Arc::new(MemoryDirectory::new());
        let sessions = SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            users.clone(),
            policy,
        );
        let auth = Authenticator::new(
            TelegramVerifier::new(BOT_TOKEN),
            users.clone(),
            store.clone(),
            sessions,
        );
        Fixture {
            auth,
            users,
            directory: DirectoryService::new(store.clone(), store),
        }
    }

    fn claim(telegram_id: i64) -> TelegramClaim {
        let mut claim = TelegramClaim {
            id: telegram_id,
            first_name: Some("Ivan".to_string()),
            last_name: None,
            username: Some("ivan".to_string()),
            photo_url: None,
            auth_date: Utc::now().timestamp() - 30,
            hash: String::new(),
        };
        claim.hash = TelegramVerifier::new(BOT_TOKEN).sign(&claim);
        claim
    }

    #[tokio::test]
    async fn first_login_creates_user_linked_to_contact() {
        let fx = fixture(SessionPolicy::default());
        let contact = fx
            .directory
            .create_contact(NewContact {
                name: "Иван".to_string(),
                phone: "+79990000001".to_string(),
                email: "ivan@example.com".to_string(),
                telegram_id: Some(1001),
                ..NewContact::default()
            })
            .await
            .unwrap();

        let (session, user) = fx.auth.login(&claim(1001)).await.unwrap();
        assert_eq!(user.telegram_id(), 1001);
        assert_eq!(user.contact_id(), Some(contact.id));
        assert_eq!(session.user_id(), user.id());

        let (resolved, _) = fx.auth.sessions().resolve(session.token()).await.unwrap();
        assert_eq!(resolved.user_id(), user.id());
    }

    #[tokio::test]
    async fn first_login_without_contact_is_unlinked() {
        let fx = fixture(SessionPolicy::default());
        let (_, user) = fx.auth.login(&claim(2002)).await.unwrap();
        assert_eq!(user.contact_id(), None);
    }

    #[tokio::test]
    async fn second_login_reuses_user_and_keeps_both_sessions() {
        let fx = fixture(SessionPolicy::default());
        let (first, user) = fx.auth.login(&claim(3003)).await.unwrap();
        let (second, again) = fx.auth.login(&claim(3003)).await.unwrap();

        assert_eq!(user.id(), again.id());
        assert_ne!(first.token(), second.token());
        assert!(fx.auth.sessions().resolve(first.token()).await.is_ok());
    }

    #[tokio::test]
    async fn tampered_claim_is_rejected() {
        let fx = fixture(SessionPolicy::default());
        let mut tampered = claim(4004);
        tampered.username = Some("mallory".to_string());

        assert_eq!(
            fx.auth.login(&tampered).await.unwrap_err(),
            LoginError::Rejected
        );
        assert!(fx.users.find_by_telegram_id(4004).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_claim_is_rejected() {
        let fx = fixture(SessionPolicy::default());
        let mut stale = claim(5005);
        stale.auth_date = Utc::now().timestamp() - 2 * 24 * 60 * 60;
        stale.hash = TelegramVerifier::new(BOT_TOKEN).sign(&stale);

        assert_eq!(
            fx.auth.login(&stale).await.unwrap_err(),
            LoginError::Rejected
        );
    }

    #[tokio::test]
    async fn inactive_user_is_rejected_by_default() {
        let fx = fixture(SessionPolicy::default());
        let (_, user) = fx.auth.login(&claim(6006)).await.unwrap();
        fx.users.set_active(user.id(), false).await.unwrap();

        assert_eq!(
            fx.auth.login(&claim(6006)).await.unwrap_err(),
            LoginError::Rejected
        );
    }

    #[tokio::test]
    async fn inactive_user_is_reactivated_when_policy_allows() {
        let fx = fixture(SessionPolicy {
            reactivate_inactive_users: true,
            ..SessionPolicy::default()
        });
        let (_, user) = fx.auth.login(&claim(7007)).await.unwrap();
        fx.users.set_active(user.id(), false).await.unwrap();

        let (_, again) = fx.auth.login(&claim(7007)).await.unwrap();
        assert!(again.is_active());
        assert!(
            fx.users
                .find_by_id(user.id())
                .await
                .unwrap()
                .unwrap()
                .is_active()
        );
    }

    #[test]
    fn admin_flag_follows_grant() {
        let user = User::new(1, None);
        let session = Session::new(user.id(), chrono::Duration::hours(1));
        let plain = AuthenticatedUser::new(session.clone(), user.clone(), None);
        let admin = AuthenticatedUser::new(session, user, Some(AccessGrant::AdminGroup));

        assert!(!plain.is_admin());
        assert!(admin.is_admin());
        assert_eq!(admin.grant(), Some(AccessGrant::AdminGroup));
    }
}
