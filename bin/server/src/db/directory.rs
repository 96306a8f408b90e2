//! Directory contacts, groups and memberships in Postgres.
//!
//! Contacts are loaded in two queries: the contact rows, then every
//! membership of those contacts joined with its group.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rim_core::{ContactId, GroupId, StoreError};
use rim_directory::{Contact, ContactRepository, Group, GroupRepository, Printer, Transport};
use rootcause::Report;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::str::FromStr;

use super::{decode_error, store_error};

const CONTACT_COLUMNS: &str = "id, name, phone, email, transport, printer, allergies, vk, \
                               telegram, telegram_id, created_at, updated_at";

/// Row type for contact queries.
#[derive(FromRow)]
struct ContactRow {
    id: String,
    name: String,
    phone: String,
    email: String,
    transport: Option<String>,
    printer: Option<String>,
    allergies: Option<String>,
    vk: Option<String>,
    telegram: Option<String>,
    telegram_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ContactRow {
    fn try_into_contact(self, groups: Vec<Group>) -> Result<Contact, StoreError> {
        let id =
            ContactId::from_str(&self.id).map_err(|e| decode_error("contact id", &self.id, e))?;
        let transport = self
            .transport
            .map(|raw| Transport::from_str(&raw).map_err(|e| decode_error("transport", &raw, e)))
            .transpose()?;
        let printer = self
            .printer
            .map(|raw| Printer::from_str(&raw).map_err(|e| decode_error("printer", &raw, e)))
            .transpose()?;
        Ok(Contact {
            id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            transport,
            printer,
            allergies: self.allergies,
            vk: self.vk,
            telegram: self.telegram,
            telegram_id: self.telegram_id,
            groups,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row type for group queries.
#[derive(FromRow)]
struct GroupRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn try_into_group(self) -> Result<Group, StoreError> {
        let id = GroupId::from_str(&self.id).map_err(|e| decode_error("group id", &self.id, e))?;
        Ok(Group {
            id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A membership joined with its group.
#[derive(FromRow)]
struct MembershipRow {
    contact_id: String,
    #[sqlx(flatten)]
    group: GroupRow,
}

/// Repository for contacts and groups.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Creates a new directory repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        column: &str,
        bind: ContactFilter<'_>,
    ) -> Result<Option<Contact>, Report<StoreError>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE {column} = $1");
        let query = sqlx::query_as::<_, ContactRow>(&sql);
        let query = match bind {
            ContactFilter::Text(value) => query.bind(value.to_string()),
            ContactFilter::Int(value) => query.bind(value),
        };
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match row {
            Some(row) => Ok(self.with_groups(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Attaches group memberships to contact rows, preserving row order.
    async fn with_groups(&self, rows: Vec<ContactRow>) -> Result<Vec<Contact>, Report<StoreError>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let memberships: Vec<MembershipRow> = sqlx::query_as(
            r#"
            SELECT cg.contact_id, g.id, g.name, g.created_at, g.updated_at
            FROM contact_groups cg
            JOIN groups g ON g.id = cg.group_id
            WHERE cg.contact_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut by_contact: HashMap<String, Vec<Group>> = HashMap::new();
        for membership in memberships {
            by_contact
                .entry(membership.contact_id)
                .or_default()
                .push(membership.group.try_into_group()?);
        }

        let mut contacts = Vec::with_capacity(rows.len());
        for row in rows {
            let groups = by_contact.remove(&row.id).unwrap_or_default();
            contacts.push(row.try_into_contact(groups)?);
        }
        Ok(contacts)
    }
}

enum ContactFilter<'a> {
    Text(&'a str),
    Int(i64),
}

async fn insert_memberships(
    tx: &mut Transaction<'_, Postgres>,
    contact: &Contact,
) -> Result<(), StoreError> {
    for group in &contact.groups {
        sqlx::query(
            r#"
            INSERT INTO contact_groups (contact_id, group_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(contact.id.to_string())
        .bind(group.id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(store_error)?;
    }
    Ok(())
}

#[async_trait]
impl ContactRepository for PgDirectory {
    async fn insert(&self, contact: &Contact) -> Result<(), Report<StoreError>> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query(
            r#"
            INSERT INTO contacts (id, name, phone, email, transport, printer, allergies, vk,
                                  telegram, telegram_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(contact.id.to_string())
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.email)
        .bind(contact.transport.map(|t| t.as_str()))
        .bind(contact.printer.map(|p| p.as_str()))
        .bind(&contact.allergies)
        .bind(&contact.vk)
        .bind(&contact.telegram)
        .bind(contact.telegram_id)
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        insert_memberships(&mut tx, contact).await?;
        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, Report<StoreError>> {
        self.find_one("id", ContactFilter::Text(&id.to_string()))
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, Report<StoreError>> {
        self.find_one("email", ContactFilter::Text(email)).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>, Report<StoreError>> {
        self.find_one("phone", ContactFilter::Text(phone)).await
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Contact>, Report<StoreError>> {
        self.find_one("telegram_id", ContactFilter::Int(telegram_id))
            .await
    }

    async fn list(&self) -> Result<Vec<Contact>, Report<StoreError>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY created_at, id");
        let rows: Vec<ContactRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        self.with_groups(rows).await
    }

    async fn update(&self, contact: &Contact) -> Result<(), Report<StoreError>> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET name = $2, phone = $3, email = $4, transport = $5, printer = $6,
                allergies = $7, vk = $8, telegram = $9, telegram_id = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(contact.id.to_string())
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.email)
        .bind(contact.transport.map(|t| t.as_str()))
        .bind(contact.printer.map(|p| p.as_str()))
        .bind(&contact.allergies)
        .bind(&contact.vk)
        .bind(&contact.telegram)
        .bind(contact.telegram_id)
        .bind(contact.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query {
                details: format!("contact {} does not exist", contact.id),
            }
            .into());
        }

        sqlx::query("DELETE FROM contact_groups WHERE contact_id = $1")
            .bind(contact.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        insert_memberships(&mut tx, contact).await?;

        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    async fn delete(&self, id: ContactId) -> Result<bool, Report<StoreError>> {
        // Memberships go with the contact through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_to_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            INSERT INTO contact_groups (contact_id, group_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(contact_id.to_string())
        .bind(group_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn remove_from_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), Report<StoreError>> {
        sqlx::query("DELETE FROM contact_groups WHERE contact_id = $1 AND group_id = $2")
            .bind(contact_id.to_string())
            .bind(group_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl GroupRepository for PgDirectory {
    async fn insert(&self, group: &Group) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            INSERT INTO groups (id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, Report<StoreError>> {
        let row: Option<GroupRow> = sqlx::query_as(
            "SELECT id, name, created_at, updated_at FROM groups WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(GroupRow::try_into_group).transpose()?)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Group>, Report<StoreError>> {
        let row: Option<GroupRow> = sqlx::query_as(
            "SELECT id, name, created_at, updated_at FROM groups WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(GroupRow::try_into_group).transpose()?)
    }

    async fn list(&self) -> Result<Vec<Group>, Report<StoreError>> {
        let rows: Vec<GroupRow> =
            sqlx::query_as("SELECT id, name, created_at, updated_at FROM groups ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update(&self, group: &Group) -> Result<(), Report<StoreError>> {
        sqlx::query("UPDATE groups SET name = $2, updated_at = $3 WHERE id = $1")
            .bind(group.id.to_string())
            .bind(&group.name)
            .bind(group.updated_at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete(&self, id: GroupId) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }
}
