//! Platform access for the RIM directory.
//!
//! This crate provides:
//! - Telegram widget login (`TelegramVerifier`, `Authenticator`)
//! - Server-side sessions with a TTL (`Session`, `SessionManager`)
//! - Session-bound CSRF tokens (`csrf`)
//! - Administrator gating by directory group membership (`AuthorizationGate`)
//! - The persisted debug-mode switch (`SystemSettings`)
//!
//! # Access Control Model
//!
//! Any verified Telegram user may log in. A user is an administrator when
//! the directory entry with their Telegram ID belongs to the administrators
//! group, or while debug mode is on. Membership is re-checked on every
//! request.
//!
//! # Example
//!
//! ```
//! use rim_platform_access::{csrf, Session};
//! use rim_core::UserId;
//! use chrono::Duration;
//!
//! let session = Session::new(UserId::new(), Duration::hours(1));
//! let token = csrf::issue_token(session.token());
//! assert!(csrf::validate_token(session.token(), &token));
//! ```

pub mod auth;
pub mod csrf;
pub mod error;
pub mod gate;
pub mod manager;
pub mod memory;
pub mod session;
pub mod store;
pub mod system;
pub mod telegram;
pub mod user;

// Re-export main types at crate root
pub use auth::{AuthenticatedUser, Authenticator};
pub use error::{LoginError, SessionError, SettingsError};
pub use gate::{AccessGrant, AdminGroup, AuthorizationGate, DebugModeProvider};
pub use manager::{SessionManager, SessionPolicy};
pub use memory::{MemorySessionStore, MemorySettings, MemoryUserRepository};
pub use session::{Session, SessionToken};
pub use store::{DirectoryLookup, SessionStore, SettingsRepository, UserRepository};
pub use system::{DebugModeStatus, SystemSettings};
pub use telegram::{TelegramClaim, TelegramVerifier};
pub use user::User;
