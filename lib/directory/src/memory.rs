//! In-memory contact and group storage.
//!
//! Used by tests and local runs without Postgres. Enforces the same unique
//! constraints as the relational schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rim_core::{ContactId, GroupId, StoreError};
use rootcause::Report;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use crate::contact::{Contact, Printer, Transport};
use crate::group::Group;
use crate::repository::{ContactRepository, GroupRepository};

/// Contact row without the joined groups.
#[derive(Debug, Clone)]
struct ContactRow {
    id: ContactId,
    name: String,
    phone: String,
    email: String,
    transport: Option<Transport>,
    printer: Option<Printer>,
    allergies: Option<String>,
    vk: Option<String>,
    telegram: Option<String>,
    telegram_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Contact> for ContactRow {
    fn from(c: &Contact) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            phone: c.phone.clone(),
            email: c.email.clone(),
            transport: c.transport,
            printer: c.printer,
            allergies: c.allergies.clone(),
            vk: c.vk.clone(),
            telegram: c.telegram.clone(),
            telegram_id: c.telegram_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Default)]
struct State {
    contacts: BTreeMap<ContactId, ContactRow>,
    groups: BTreeMap<GroupId, Group>,
    memberships: BTreeSet<(ContactId, GroupId)>,
}

impl State {
    fn assemble(&self, row: &ContactRow) -> Contact {
        let mut groups: Vec<Group> = self
            .memberships
            .iter()
            .filter(|(contact_id, _)| *contact_id == row.id)
            .filter_map(|(_, group_id)| self.groups.get(group_id).cloned())
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));

        Contact {
            id: row.id,
            name: row.name.clone(),
            phone: row.phone.clone(),
            email: row.email.clone(),
            transport: row.transport,
            printer: row.printer,
            allergies: row.allergies.clone(),
            vk: row.vk.clone(),
            telegram: row.telegram.clone(),
            telegram_id: row.telegram_id,
            groups,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn find_contact(&self, predicate: impl Fn(&ContactRow) -> bool) -> Option<Contact> {
        self.contacts
            .values()
            .find(|row| predicate(row))
            .map(|row| self.assemble(row))
    }

    fn check_unique(&self, candidate: &ContactRow) -> Result<(), Report<StoreError>> {
        for other in self.contacts.values().filter(|r| r.id != candidate.id) {
            let clash = if other.email == candidate.email {
                Some("email")
            } else if other.phone == candidate.phone {
                Some("phone")
            } else if candidate.telegram_id.is_some() && other.telegram_id == candidate.telegram_id
            {
                Some("telegram_id")
            } else {
                None
            };
            if let Some(column) = clash {
                return Err(StoreError::Conflict {
                    details: format!("duplicate contacts.{column}"),
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_groups_exist(&self, contact: &Contact) -> Result<(), Report<StoreError>> {
        for group in &contact.groups {
            if !self.groups.contains_key(&group.id) {
                return Err(StoreError::Query {
                    details: format!("group {} does not exist", group.id),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Contact and group repositories backed by process memory.
#[derive(Default)]
pub struct MemoryDirectory {
    state: RwLock<State>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactRepository for MemoryDirectory {
    async fn insert(&self, contact: &Contact) -> Result<(), Report<StoreError>> {
        let mut state = self.state.write().await;
        let row = ContactRow::from(contact);
        if state.contacts.contains_key(&row.id) {
            return Err(StoreError::Conflict {
                details: format!("duplicate contacts.id {}", row.id),
            }
            .into());
        }
        state.check_unique(&row)?;
        state.check_groups_exist(contact)?;

        for group in &contact.groups {
            state.memberships.insert((contact.id, group.id));
        }
        state.contacts.insert(row.id, row);
        Ok(())
    }

    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, Report<StoreError>> {
        let state = self.state.read().await;
        Ok(state.contacts.get(&id).map(|row| state.assemble(row)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, Report<StoreError>> {
        let state = self.state.read().await;
        Ok(state.find_contact(|row| row.email == email))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>, Report<StoreError>> {
        let state = self.state.read().await;
        Ok(state.find_contact(|row| row.phone == phone))
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Contact>, Report<StoreError>> {
        let state = self.state.read().await;
        Ok(state.find_contact(|row| row.telegram_id == Some(telegram_id)))
    }

    async fn list(&self) -> Result<Vec<Contact>, Report<StoreError>> {
        let state = self.state.read().await;
        Ok(state.contacts.values().map(|row| state.assemble(row)).collect())
    }

    async fn update(&self, contact: &Contact) -> Result<(), Report<StoreError>> {
        let mut state = self.state.write().await;
        if !state.contacts.contains_key(&contact.id) {
            return Err(StoreError::Query {
                details: format!("contact {} does not exist", contact.id),
            }
            .into());
        }
        let row = ContactRow::from(contact);
        state.check_unique(&row)?;
        state.check_groups_exist(contact)?;

        state.memberships.retain(|(contact_id, _)| *contact_id != contact.id);
        for group in &contact.groups {
            state.memberships.insert((contact.id, group.id));
        }
        state.contacts.insert(row.id, row);
        Ok(())
    }

    async fn delete(&self, id: ContactId) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.write().await;
        let existed = state.contacts.remove(&id).is_some();
        state.memberships.retain(|(contact_id, _)| *contact_id != id);
        Ok(existed)
    }

    async fn add_to_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), Report<StoreError>> {
        let mut state = self.state.write().await;
        if !state.contacts.contains_key(&contact_id) || !state.groups.contains_key(&group_id) {
            return Err(StoreError::Query {
                details: format!("membership {contact_id}/{group_id} references missing rows"),
            }
            .into());
        }
        state.memberships.insert((contact_id, group_id));
        Ok(())
    }

    async fn remove_from_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), Report<StoreError>> {
        self.state
            .write()
            .await
            .memberships
            .remove(&(contact_id, group_id));
        Ok(())
    }
}

#[async_trait]
impl GroupRepository for MemoryDirectory {
    async fn insert(&self, group: &Group) -> Result<(), Report<StoreError>> {
        let mut state = self.state.write().await;
        if state.groups.values().any(|g| g.name == group.name) {
            return Err(StoreError::Conflict {
                details: "duplicate groups.name".to_string(),
            }
            .into());
        }
        state.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, Report<StoreError>> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Group>, Report<StoreError>> {
        let state = self.state.read().await;
        Ok(state.groups.values().find(|g| g.name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<Group>, Report<StoreError>> {
        let state = self.state.read().await;
        let mut groups: Vec<Group> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn update(&self, group: &Group) -> Result<(), Report<StoreError>> {
        let mut state = self.state.write().await;
        if state
            .groups
            .values()
            .any(|g| g.id != group.id && g.name == group.name)
        {
            return Err(StoreError::Conflict {
                details: "duplicate groups.name".to_string(),
            }
            .into());
        }
        match state.groups.get_mut(&group.id) {
            Some(existing) => {
                *existing = group.clone();
                Ok(())
            }
            None => Err(StoreError::Query {
                details: format!("group {} does not exist", group.id),
            }
            .into()),
        }
    }

    async fn delete(&self, id: GroupId) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.write().await;
        let existed = state.groups.remove(&id).is_some();
        state.memberships.retain(|(_, group_id)| *group_id != id);
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: &str, phone: &str) -> Contact {
        let now = Utc::now();
        Contact {
            id: ContactId::new(),
            name: "Тест".to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            transport: None,
            printer: None,
            allergies: None,
            vk: None,
            telegram: None,
            telegram_id: None,
            groups: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn unique_email_is_enforced() {
        let store = MemoryDirectory::new();
        ContactRepository::insert(&store, &contact("a@example.com", "+70000000001"))
            .await
            .unwrap();
        let result =
            ContactRepository::insert(&store, &contact("a@example.com", "+70000000002")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn update_replaces_memberships() {
        let store = MemoryDirectory::new();
        let first = Group::new("Первая");
        let second = Group::new("Вторая");
        GroupRepository::insert(&store, &first).await.unwrap();
        GroupRepository::insert(&store, &second).await.unwrap();

        let mut c = contact("a@example.com", "+70000000001");
        c.groups = vec![first.clone()];
        ContactRepository::insert(&store, &c).await.unwrap();

        c.groups = vec![second.clone()];
        ContactRepository::update(&store, &c).await.unwrap();

        let loaded = ContactRepository::find_by_id(&store, c.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.group_ids(), vec![second.id]);
    }

    #[tokio::test]
    async fn renamed_group_is_visible_through_contact() {
        let store = MemoryDirectory::new();
        let mut group = Group::new("Администраторы");
        GroupRepository::insert(&store, &group).await.unwrap();

        let mut c = contact("a@example.com", "+70000000001");
        c.telegram_id = Some(42);
        c.groups = vec![group.clone()];
        ContactRepository::insert(&store, &c).await.unwrap();

        group.rename("Бывшие администраторы");
        GroupRepository::update(&store, &group).await.unwrap();

        let loaded = store.find_by_telegram_id(42).await.unwrap().unwrap();
        assert!(!loaded.is_member_of("Администраторы"));
        assert!(loaded.is_member_of("Бывшие администраторы"));
    }
}
