//! User accounts in Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rim_core::{ContactId, StoreError, UserId};
use rim_platform_access::{User, UserRepository};
use rootcause::Report;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

use super::{decode_error, store_error};

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    telegram_id: i64,
    is_active: bool,
    contact_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, StoreError> {
        let id = UserId::from_str(&self.id).map_err(|e| decode_error("user id", &self.id, e))?;
        let contact_id = self
            .contact_id
            .map(|raw| ContactId::from_str(&raw).map_err(|e| decode_error("contact id", &raw, e)))
            .transpose()?;
        Ok(User::with_all_fields(
            id,
            self.telegram_id,
            self.is_active,
            contact_id,
            self.created_at,
        ))
    }
}

/// Repository for user accounts.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<StoreError>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, telegram_id, is_active, contact_id, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(UserRow::try_into_user).transpose()?)
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<User>, Report<StoreError>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, telegram_id, is_active, contact_id, created_at
            FROM users
            WHERE telegram_id = $1
            "#,
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(UserRow::try_into_user).transpose()?)
    }

    async fn create(&self, user: &User) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            INSERT INTO users (id, telegram_id, is_active, contact_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.telegram_id())
        .bind(user.is_active())
        .bind(user.contact_id().map(|id| id.to_string()))
        .bind(user.created_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<(), Report<StoreError>> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query {
                details: format!("user {id} does not exist"),
            }
            .into());
        }
        Ok(())
    }
}
