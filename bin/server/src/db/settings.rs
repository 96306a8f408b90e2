//! Key/value system settings in Postgres.

use async_trait::async_trait;
use rim_core::StoreError;
use rim_platform_access::SettingsRepository;
use rootcause::Report;
use sqlx::PgPool;

use super::store_error;

/// Repository for the `system_settings` table.
#[derive(Clone)]
pub struct PgSettings {
    pool: PgPool,
}

impl PgSettings {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PgSettings {
    async fn get(&self, key: &str) -> Result<Option<String>, Report<StoreError>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM system_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }
}
