//! Administrator gating.
//!
//! A user is an administrator when the directory entry carrying their
//! Telegram ID belongs to the configured administrators group. The entry is
//! looked up live on every check, so membership changes and group renames
//! take effect on the next request.
//!
//! Debug mode overrides the group check for every authenticated user. The
//! start-up flag is consulted first, then the persisted setting.

use async_trait::async_trait;
use rim_core::UserId;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::SettingsError;
use crate::store::{DirectoryLookup, UserRepository};

/// Group name that marks administrators when none is configured.
pub const DEFAULT_ADMIN_GROUP: &str = "Администраторы";

/// Name of the group whose members are administrators. Matched exactly and
/// case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminGroup(String);

impl AdminGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AdminGroup {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_GROUP)
    }
}

impl fmt::Display for AdminGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the debug-mode override.
#[async_trait]
pub trait DebugModeProvider: Send + Sync {
    /// The flag fixed at process start.
    fn forced(&self) -> bool;

    /// The persisted runtime toggle.
    async fn persisted(&self) -> Result<bool, SettingsError>;
}

/// Why a user was granted administrator rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    /// Debug mode forced on at start-up.
    ForcedDebug,
    /// Persisted debug-mode setting is on.
    DebugMode,
    /// Member of the administrators group.
    AdminGroup,
}

/// Decides administrator privilege for authenticated users.
#[derive(Clone)]
pub struct AuthorizationGate {
    users: Arc<dyn UserRepository>,
    directory: Arc<dyn DirectoryLookup>,
    debug_mode: Arc<dyn DebugModeProvider>,
    admin_group: AdminGroup,
}

impl AuthorizationGate {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        directory: Arc<dyn DirectoryLookup>,
        debug_mode: Arc<dyn DebugModeProvider>,
        admin_group: AdminGroup,
    ) -> Self {
        Self {
            users,
            directory,
            debug_mode,
            admin_group,
        }
    }

    #[must_use]
    pub fn admin_group(&self) -> &AdminGroup {
        &self.admin_group
    }

    /// Returns true only if the user's directory entry belongs to the
    /// administrators group. Lookup failures count as not privileged.
    pub async fn is_privileged(&self, user_id: UserId) -> bool {
        let user = match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return false,
            Err(err) => {
                error!(user_id = %user_id, error = %err, "user lookup failed during privilege check");
                return false;
            }
        };

        match self.directory.find_by_telegram_id(user.telegram_id()).await {
            Ok(Some(contact)) => contact.is_member_of(self.admin_group.as_str()),
            Ok(None) => {
                debug!(user_id = %user_id, "no directory entry for user");
                false
            }
            Err(err) => {
                error!(user_id = %user_id, error = %err, "directory lookup failed during privilege check");
                false
            }
        }
    }

    /// Returns the debug override in effect, if any. A failed read of the
    /// persisted setting counts as off.
    pub async fn debug_override(&self) -> Option<AccessGrant> {
        if self.debug_mode.forced() {
            return Some(AccessGrant::ForcedDebug);
        }
        match self.debug_mode.persisted().await {
            Ok(true) => Some(AccessGrant::DebugMode),
            Ok(false) => None,
            Err(err) => {
                warn!(error = %err, "debug mode lookup failed, treating as off");
                None
            }
        }
    }

    /// Decides administrator rights: debug override first, then group
    /// membership. `None` means the request must be denied.
    pub async fn evaluate(&self, user_id: UserId) -> Option<AccessGrant> {
        if let Some(grant) = self.debug_override().await {
            debug!(user_id = %user_id, grant = ?grant, "administrator rights granted by debug mode");
            return Some(grant);
        }
        if self.is_privileged(user_id).await {
            Some(AccessGrant::AdminGroup)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryUserRepository;
    use crate::store::UserRepository;
    use crate::user::User;
    use rim_core::StoreError;
    use rim_directory::{
        Contact, ContactChanges, DirectoryService, GroupName, MemoryDirectory, NewContact,
    };
    use rootcause::Report;

    struct FixedDebugMode {
        forced: bool,
        persisted: Result<bool, SettingsError>,
    }

    #[async_trait]
    impl DebugModeProvider for FixedDebugMode {
        fn forced(&self) -> bool {
            self.forced
        }

        async fn persisted(&self) -> Result<bool, SettingsError> {
            self.persisted.clone()
        }
    }

    struct BrokenDirectory;

    #[async_trait]
    impl DirectoryLookup for BrokenDirectory {
        async fn find_by_telegram_id(
            &self,
            _telegram_id: i64,
        ) -> Result<Option<Contact>, Report<StoreError>> {
            Err(StoreError::Unavailable {
                details: "database is down".to_string(),
            }
            .into())
        }
    }

    fn debug_off() -> Arc<FixedDebugMode> {
        Arc::new(FixedDebugMode {
            forced: false,
            persisted: Ok(false),
        })
    }

    struct Fixture {
        gate: AuthorizationGate,
        directory: DirectoryService,
        user: User,
        contact: Contact,
    }

    async fn fixture(debug: Arc<FixedDebugMode>) -> Fixture {
        let store = Arc::new(MemoryDirectory::new());
        let directory = DirectoryService::new(store.clone(), store.clone());
        let users = Arc::new(MemoryUserRepository::new());

        let contact = directory
            .create_contact(NewContact {
                name: "Ольга".to_string(),
                phone: "+79990000042".to_string(),
                email: "olga@example.com".to_string(),
                telegram_id: Some(42),
                ..NewContact::default()
            })
            .await
            .unwrap();
        let user = User::new(42, Some(contact.id));
        users.create(&user).await.unwrap();

        let gate = AuthorizationGate::new(users, store, debug, AdminGroup::default());
        Fixture {
            gate,
            directory,
            user,
            contact,
        }
    }

    #[tokio::test]
    async fn membership_in_admin_group_is_privileged() {
        let fx = fixture(debug_off()).await;
        assert!(!fx.gate.is_privileged(fx.user.id()).await);

        let admins = fx
            .directory
            .create_group(GroupName {
                name: DEFAULT_ADMIN_GROUP.to_string(),
            })
            .await
            .unwrap();
        fx.directory
            .add_contact_to_group(fx.contact.id, admins.id)
            .await
            .unwrap();

        assert!(fx.gate.is_privileged(fx.user.id()).await);
        assert_eq!(
            fx.gate.evaluate(fx.user.id()).await,
            Some(AccessGrant::AdminGroup)
        );
    }

    #[tokio::test]
    async fn rename_and_removal_take_effect_immediately() {
        let fx = fixture(debug_off()).await;
        let admins = fx
            .directory
            .create_group(GroupName {
                name: DEFAULT_ADMIN_GROUP.to_string(),
            })
            .await
            .unwrap();
        fx.directory
            .update_contact(
                fx.contact.id,
                ContactChanges {
                    group_ids: Some(vec![admins.id]),
                    ..ContactChanges::default()
                },
            )
            .await
            .unwrap();
        assert!(fx.gate.is_privileged(fx.user.id()).await);

        fx.directory
            .rename_group(
                admins.id,
                GroupName {
                    name: "администраторы".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(!fx.gate.is_privileged(fx.user.id()).await);

        fx.directory
            .rename_group(
                admins.id,
                GroupName {
                    name: DEFAULT_ADMIN_GROUP.to_string(),
                },
            )
            .await
            .unwrap();
        assert!(fx.gate.is_privileged(fx.user.id()).await);

        fx.directory
            .remove_contact_from_group(fx.contact.id, admins.id)
            .await
            .unwrap();
        assert!(!fx.gate.is_privileged(fx.user.id()).await);
    }

    #[tokio::test]
    async fn unknown_user_is_not_privileged() {
        let fx = fixture(debug_off()).await;
        assert!(!fx.gate.is_privileged(UserId::new()).await);
    }

    #[tokio::test]
    async fn directory_failure_fails_closed() {
        let users = Arc::new(MemoryUserRepository::new());
        let user = User::new(42, None);
        users.create(&user).await.unwrap();
        let gate = AuthorizationGate::new(
            users,
            Arc::new(BrokenDirectory),
            debug_off(),
            AdminGroup::default(),
        );
        assert!(!gate.is_privileged(user.id()).await);
        assert_eq!(gate.evaluate(user.id()).await, None);
    }

    #[tokio::test]
    async fn forced_flag_wins_over_everything() {
        let fx = fixture(Arc::new(FixedDebugMode {
            forced: true,
            persisted: Err(SettingsError::Store {
                details: "unreachable".to_string(),
            }),
        }))
        .await;
        assert_eq!(
            fx.gate.evaluate(fx.user.id()).await,
            Some(AccessGrant::ForcedDebug)
        );
    }

    #[tokio::test]
    async fn persisted_debug_mode_grants_access() {
        let fx = fixture(Arc::new(FixedDebugMode {
            forced: false,
            persisted: Ok(true),
        }))
        .await;
        assert_eq!(
            fx.gate.evaluate(fx.user.id()).await,
            Some(AccessGrant::DebugMode)
        );
    }

    #[tokio::test]
    async fn debug_lookup_failure_counts_as_off() {
        let fx = fixture(Arc::new(FixedDebugMode {
            forced: false,
            persisted: Err(SettingsError::Store {
                details: "timeout".to_string(),
            }),
        }))
        .await;
        assert_eq!(fx.gate.debug_override().await, None);
        assert_eq!(fx.gate.evaluate(fx.user.id()).await, None);
    }
}
