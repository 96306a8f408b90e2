//! Persisted system settings and the debug-mode switch.
//!
//! Debug mode grants administrator rights to every authenticated user. It
//! has two sources: a process-wide flag fixed at start-up, which wins, and a
//! persisted setting that administrators toggle at runtime. Neither should
//! be enabled in production.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SettingsError;
use crate::gate::DebugModeProvider;
use crate::store::SettingsRepository;

/// Settings key of the persisted debug flag.
pub const DEBUG_MODE_KEY: &str = "debug_mode";

/// Current debug-mode state as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DebugModeStatus {
    /// Whether debug mode is in effect.
    pub enabled: bool,
    /// The persisted toggle.
    pub persisted: bool,
    /// The start-up flag.
    pub forced: bool,
}

/// Access to the persisted settings plus the start-up debug flag.
#[derive(Clone)]
pub struct SystemSettings {
    settings: Arc<dyn SettingsRepository>,
    force_debug: bool,
}

impl SystemSettings {
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsRepository>, force_debug: bool) -> Self {
        if force_debug {
            warn!("debug mode forced on at start-up: every authenticated user is an administrator");
        }
        Self {
            settings,
            force_debug,
        }
    }

    /// Writes `debug_mode = false` if the key is absent.
    pub async fn ensure_initialized(&self) -> Result<(), SettingsError> {
        if self.settings.get(DEBUG_MODE_KEY).await?.is_none() {
            self.settings.set(DEBUG_MODE_KEY, "false").await?;
            info!(key = DEBUG_MODE_KEY, "initialised system setting");
        }
        Ok(())
    }

    /// Reads the persisted flag. An absent key reads as false.
    pub async fn debug_mode(&self) -> Result<bool, SettingsError> {
        match self.settings.get(DEBUG_MODE_KEY).await? {
            None => Ok(false),
            Some(value) => parse_bool(&value).ok_or(SettingsError::InvalidValue {
                key: DEBUG_MODE_KEY.to_string(),
                value,
            }),
        }
    }

    /// Persists the flag.
    pub async fn set_debug_mode(&self, enabled: bool) -> Result<(), SettingsError> {
        self.settings
            .set(DEBUG_MODE_KEY, if enabled { "true" } else { "false" })
            .await?;
        info!(enabled, "debug mode setting updated");
        Ok(())
    }

    /// Reports the persisted, forced and effective state.
    pub async fn status(&self) -> Result<DebugModeStatus, SettingsError> {
        let persisted = self.debug_mode().await?;
        Ok(DebugModeStatus {
            enabled: self.force_debug || persisted,
            persisted,
            forced: self.force_debug,
        })
    }
}

#[async_trait]
impl DebugModeProvider for SystemSettings {
    fn forced(&self) -> bool {
        self.force_debug
    }

    async fn persisted(&self) -> Result<bool, SettingsError> {
        self.debug_mode().await
    }
}

/// Parses the boolean spellings the settings table has historically held.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySettings;

    fn settings(force: bool) -> (SystemSettings, Arc<MemorySettings>) {
        let store = Arc::new(MemorySettings::new());
        (SystemSettings::new(store.clone(), force), store)
    }

    #[tokio::test]
    async fn initialises_missing_key_to_false() {
        let (system, store) = settings(false);
        system.ensure_initialized().await.unwrap();
        assert_eq!(
            store.get(DEBUG_MODE_KEY).await.unwrap().as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn initialisation_keeps_existing_value() {
        let (system, store) = settings(false);
        store.set(DEBUG_MODE_KEY, "true").await.unwrap();
        system.ensure_initialized().await.unwrap();
        assert!(system.debug_mode().await.unwrap());
    }

    #[tokio::test]
    async fn absent_key_reads_false() {
        let (system, _) = settings(false);
        assert!(!system.debug_mode().await.unwrap());
    }

    #[tokio::test]
    async fn toggle_round_trip() {
        let (system, _) = settings(false);
        system.set_debug_mode(true).await.unwrap();
        assert!(system.debug_mode().await.unwrap());
        system.set_debug_mode(false).await.unwrap();
        assert!(!system.debug_mode().await.unwrap());
    }

    #[tokio::test]
    async fn garbage_value_is_an_error() {
        let (system, store) = settings(false);
        store.set(DEBUG_MODE_KEY, "yes please").await.unwrap();
        let err = system.debug_mode().await.unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn status_reports_forced_flag() {
        let (system, _) = settings(true);
        let status = system.status().await.unwrap();
        assert!(status.enabled);
        assert!(status.forced);
        assert!(!status.persisted);
    }

    #[test]
    fn parses_legacy_spellings() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("on"), None);
    }
}
