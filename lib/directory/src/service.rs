//! Directory use cases: contact and group CRUD with uniqueness and
//! referential checks.

use chrono::Utc;
use rim_core::{ContactId, GroupId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::contact::{Contact, ContactChanges, NewContact, non_empty};
use crate::error::DirectoryError;
use crate::group::{Group, GroupName};
use crate::repository::{ContactRepository, GroupRepository};

/// Contact and group operations over the repository traits.
#[derive(Clone)]
pub struct DirectoryService {
    contacts: Arc<dyn ContactRepository>,
    groups: Arc<dyn GroupRepository>,
}

impl DirectoryService {
    /// Creates a service over the given repositories.
    #[must_use]
    pub fn new(contacts: Arc<dyn ContactRepository>, groups: Arc<dyn GroupRepository>) -> Self {
        Self { contacts, groups }
    }

    /// Creates a contact after validating it and checking that the email,
    /// phone and Telegram ID are free and every listed group exists.
    pub async fn create_contact(&self, request: NewContact) -> Result<Contact, DirectoryError> {
        request.validate()?;

        let email = request.email.trim().to_string();
        let phone = request.phone.trim().to_string();
        self.ensure_email_free(&email, None).await?;
        self.ensure_phone_free(&phone, None).await?;
        if let Some(telegram_id) = request.telegram_id {
            self.ensure_telegram_id_free(telegram_id, None).await?;
        }
        let groups = self.resolve_groups(&request.group_ids).await?;

        let now = Utc::now();
        let contact = Contact {
            id: ContactId::new(),
            name: request.name.trim().to_string(),
            phone,
            email,
            transport: non_empty(request.transport.as_deref()).and_then(|v| v.parse().ok()),
            printer: non_empty(request.printer.as_deref()).and_then(|v| v.parse().ok()),
            allergies: optional(request.allergies.as_deref()),
            vk: optional(request.vk.as_deref()),
            telegram: optional(request.telegram.as_deref()),
            telegram_id: request.telegram_id,
            groups,
            created_at: now,
            updated_at: now,
        };
        self.contacts.insert(&contact).await?;

        info!(contact_id = %contact.id, "contact created");
        Ok(contact)
    }

    /// Returns one contact.
    pub async fn get_contact(&self, id: ContactId) -> Result<Contact, DirectoryError> {
        self.contacts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DirectoryError::contact_not_found(id))
    }

    /// Returns every contact.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, DirectoryError> {
        Ok(self.contacts.list().await?)
    }

    /// Finds the contact carrying a Telegram user ID, if any.
    pub async fn find_contact_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Contact>, DirectoryError> {
        Ok(self.contacts.find_by_telegram_id(telegram_id).await?)
    }

    /// Applies a partial update. When `group_ids` is present the group list
    /// is replaced as a whole.
    pub async fn update_contact(
        &self,
        id: ContactId,
        changes: ContactChanges,
    ) -> Result<Contact, DirectoryError> {
        changes.validate()?;
        let mut contact = self.get_contact(id).await?;

        if changes.is_empty() {
            return Ok(contact);
        }

        if let Some(name) = &changes.name {
            contact.name = name.trim().to_string();
        }
        if let Some(email) = &changes.email {
            let email = email.trim();
            if email != contact.email {
                self.ensure_email_free(email, Some(id)).await?;
                contact.email = email.to_string();
            }
        }
        if let Some(phone) = &changes.phone {
            let phone = phone.trim();
            if phone != contact.phone {
                self.ensure_phone_free(phone, Some(id)).await?;
                contact.phone = phone.to_string();
            }
        }
        if let Some(telegram_id) = changes.telegram_id {
            if contact.telegram_id != Some(telegram_id) {
                self.ensure_telegram_id_free(telegram_id, Some(id)).await?;
                contact.telegram_id = Some(telegram_id);
            }
        }
        if let Some(transport) = &changes.transport {
            contact.transport = non_empty(Some(transport.as_str())).and_then(|v| v.parse().ok());
        }
        if let Some(printer) = &changes.printer {
            contact.printer = non_empty(Some(printer.as_str())).and_then(|v| v.parse().ok());
        }
        if let Some(allergies) = &changes.allergies {
            contact.allergies = optional(Some(allergies.as_str()));
        }
        if let Some(vk) = &changes.vk {
            contact.vk = optional(Some(vk.as_str()));
        }
        if let Some(telegram) = &changes.telegram {
            contact.telegram = optional(Some(telegram.as_str()));
        }
        if let Some(group_ids) = &changes.group_ids {
            contact.groups = self.resolve_groups(group_ids).await?;
        }

        contact.updated_at = Utc::now();
        self.contacts.update(&contact).await?;

        info!(contact_id = %id, "contact updated");
        Ok(contact)
    }

    /// Deletes a contact.
    pub async fn delete_contact(&self, id: ContactId) -> Result<(), DirectoryError> {
        if !self.contacts.delete(id).await? {
            return Err(DirectoryError::contact_not_found(id));
        }
        info!(contact_id = %id, "contact deleted");
        Ok(())
    }

    /// Adds a contact to a group. Already being a member is not an error.
    pub async fn add_contact_to_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), DirectoryError> {
        let contact = self.get_contact(contact_id).await?;
        self.get_group(group_id).await?;

        if contact.has_group(group_id) {
            info!(contact_id = %contact_id, group_id = %group_id, "contact already in group");
            return Ok(());
        }
        self.contacts.add_to_group(contact_id, group_id).await?;
        info!(contact_id = %contact_id, group_id = %group_id, "contact added to group");
        Ok(())
    }

    /// Removes a contact from a group it belongs to.
    pub async fn remove_contact_from_group(
        &self,
        contact_id: ContactId,
        group_id: GroupId,
    ) -> Result<(), DirectoryError> {
        let contact = self.get_contact(contact_id).await?;
        self.get_group(group_id).await?;

        if !contact.has_group(group_id) {
            warn!(contact_id = %contact_id, group_id = %group_id, "contact is not in group");
            return Err(DirectoryError::NotMember {
                contact_id: contact_id.to_string(),
                group_id: group_id.to_string(),
            });
        }
        self.contacts.remove_from_group(contact_id, group_id).await?;
        info!(contact_id = %contact_id, group_id = %group_id, "contact removed from group");
        Ok(())
    }

    /// Creates a group with a unique name.
    pub async fn create_group(&self, request: GroupName) -> Result<Group, DirectoryError> {
        request.validate()?;
        let name = request.trimmed();
        if self.groups.find_by_name(name).await?.is_some() {
            return Err(DirectoryError::Conflict { field: "name" });
        }

        let group = Group::new(name);
        self.groups.insert(&group).await?;
        info!(group_id = %group.id, name = %group.name, "group created");
        Ok(group)
    }

    /// Returns one group.
    pub async fn get_group(&self, id: GroupId) -> Result<Group, DirectoryError> {
        self.groups
            .find_by_id(id)
            .await?
            .ok_or_else(|| DirectoryError::group_not_found(id))
    }

    /// Returns every group.
    pub async fn list_groups(&self) -> Result<Vec<Group>, DirectoryError> {
        Ok(self.groups.list().await?)
    }

    /// Renames a group, keeping names unique.
    pub async fn rename_group(
        &self,
        id: GroupId,
        request: GroupName,
    ) -> Result<Group, DirectoryError> {
        request.validate()?;
        let mut group = self.get_group(id).await?;
        let name = request.trimmed();
        if group.name == name {
            return Ok(group);
        }
        if let Some(existing) = self.groups.find_by_name(name).await? {
            if existing.id != id {
                return Err(DirectoryError::Conflict { field: "name" });
            }
        }

        group.rename(name);
        self.groups.update(&group).await?;
        info!(group_id = %id, name = %group.name, "group renamed");
        Ok(group)
    }

    /// Deletes a group and its memberships.
    pub async fn delete_group(&self, id: GroupId) -> Result<(), DirectoryError> {
        if !self.groups.delete(id).await? {
            return Err(DirectoryError::group_not_found(id));
        }
        info!(group_id = %id, "group deleted");
        Ok(())
    }

    async fn resolve_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>, DirectoryError> {
        let mut groups: Vec<Group> = Vec::with_capacity(ids.len());
        for id in ids {
            if groups.iter().any(|g| g.id == *id) {
                continue;
            }
            match self.groups.find_by_id(*id).await? {
                Some(group) => groups.push(group),
                None => {
                    warn!(group_id = %id, "referenced group does not exist");
                    return Err(DirectoryError::GroupNotFound { id: id.to_string() });
                }
            }
        }
        Ok(groups)
    }

    async fn ensure_email_free(
        &self,
        email: &str,
        owner: Option<ContactId>,
    ) -> Result<(), DirectoryError> {
        match self.contacts.find_by_email(email).await? {
            Some(existing) if Some(existing.id) != owner => {
                Err(DirectoryError::Conflict { field: "email" })
            }
            _ => Ok(()),
        }
    }

    async fn ensure_phone_free(
        &self,
        phone: &str,
        owner: Option<ContactId>,
    ) -> Result<(), DirectoryError> {
        match self.contacts.find_by_phone(phone).await? {
            Some(existing) if Some(existing.id) != owner => {
                Err(DirectoryError::Conflict { field: "phone" })
            }
            _ => Ok(()),
        }
    }

    async fn ensure_telegram_id_free(
        &self,
        telegram_id: i64,
        owner: Option<ContactId>,
    ) -> Result<(), DirectoryError> {
        match self.contacts.find_by_telegram_id(telegram_id).await? {
            Some(existing) if Some(existing.id) != owner => {
                Err(DirectoryError::Conflict {
                    field: "telegram_id",
                })
            }
            _ => Ok(()),
        }
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Transport;
    use crate::memory::MemoryDirectory;

    fn service() -> (DirectoryService, Arc<MemoryDirectory>) {
        let store = Arc::new(MemoryDirectory::new());
        (DirectoryService::new(store.clone(), store.clone()), store)
    }

    fn new_contact(email: &str, phone: &str) -> NewContact {
        NewContact {
            name: "Анна Смирнова".to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            ..NewContact::default()
        }
    }

    fn group_name(name: &str) -> GroupName {
        GroupName {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_contact() {
        let (service, _) = service();
        let group = service.create_group(group_name("Волонтёры")).await.unwrap();

        let created = service
            .create_contact(NewContact {
                transport: Some("есть машина".to_string()),
                allergies: Some(String::new()),
                group_ids: vec![group.id, group.id],
                ..new_contact("anna@example.com", "+79990000001")
            })
            .await
            .unwrap();

        assert_eq!(created.transport, Some(Transport::HasCar));
        assert_eq!(created.allergies, None);
        assert_eq!(created.group_ids(), vec![group.id]);

        let fetched = service.get_contact(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn invalid_contact_is_rejected_with_fields() {
        let (service, _) = service();
        let err = service
            .create_contact(new_contact("bad", "123"))
            .await
            .unwrap_err();
        match err {
            DirectoryError::Invalid(errors) => {
                assert!(errors.has_field("email"));
                assert!(errors.has_field("phone"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_email_and_phone_conflict() {
        let (service, _) = service();
        service
            .create_contact(new_contact("anna@example.com", "+79990000001"))
            .await
            .unwrap();

        let err = service
            .create_contact(new_contact("anna@example.com", "+79990000002"))
            .await
            .unwrap_err();
        assert_eq!(err, DirectoryError::Conflict { field: "email" });

        let err = service
            .create_contact(new_contact("other@example.com", "+79990000001"))
            .await
            .unwrap_err();
        assert_eq!(err, DirectoryError::Conflict { field: "phone" });
    }

    #[tokio::test]
    async fn unknown_group_is_rejected() {
        let (service, _) = service();
        let err = service
            .create_contact(NewContact {
                group_ids: vec![GroupId::new()],
                ..new_contact("anna@example.com", "+79990000001")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::GroupNotFound { .. }));
    }

    #[tokio::test]
    async fn update_replaces_groups_and_clears_fields() {
        let (service, _) = service();
        let first = service.create_group(group_name("Первая")).await.unwrap();
        let second = service.create_group(group_name("Вторая")).await.unwrap();
        let contact = service
            .create_contact(NewContact {
                vk: Some("https://vk.com/anna".to_string()),
                group_ids: vec![first.id],
                ..new_contact("anna@example.com", "+79990000001")
            })
            .await
            .unwrap();

        let updated = service
            .update_contact(
                contact.id,
                ContactChanges {
                    vk: Some(String::new()),
                    group_ids: Some(vec![second.id]),
                    ..ContactChanges::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.vk, None);
        assert_eq!(updated.group_ids(), vec![second.id]);
        let fetched = service.get_contact(contact.id).await.unwrap();
        assert_eq!(fetched.group_ids(), vec![second.id]);
    }

    #[tokio::test]
    async fn update_keeps_own_email() {
        let (service, _) = service();
        let contact = service
            .create_contact(new_contact("anna@example.com", "+79990000001"))
            .await
            .unwrap();

        let updated = service
            .update_contact(
                contact.id,
                ContactChanges {
                    email: Some("anna@example.com".to_string()),
                    name: Some("Анна С.".to_string()),
                    ..ContactChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Анна С.");
    }

    #[tokio::test]
    async fn telegram_id_must_be_unique() {
        let (service, _) = service();
        service
            .create_contact(NewContact {
                telegram_id: Some(42),
                ..new_contact("anna@example.com", "+79990000001")
            })
            .await
            .unwrap();
        let err = service
            .create_contact(NewContact {
                telegram_id: Some(42),
                ..new_contact("boris@example.com", "+79990000002")
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DirectoryError::Conflict {
                field: "telegram_id"
            }
        );

        let found = service.find_contact_by_telegram_id(42).await.unwrap();
        assert_eq!(found.map(|c| c.email), Some("anna@example.com".to_string()));
    }

    #[tokio::test]
    async fn membership_add_and_remove() {
        let (service, _) = service();
        let group = service.create_group(group_name("Администраторы")).await.unwrap();
        let contact = service
            .create_contact(new_contact("anna@example.com", "+79990000001"))
            .await
            .unwrap();

        service.add_contact_to_group(contact.id, group.id).await.unwrap();
        service.add_contact_to_group(contact.id, group.id).await.unwrap();
        let fetched = service.get_contact(contact.id).await.unwrap();
        assert!(fetched.is_member_of("Администраторы"));

        service
            .remove_contact_from_group(contact.id, group.id)
            .await
            .unwrap();
        let err = service
            .remove_contact_from_group(contact.id, group.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotMember { .. }));
    }

    #[tokio::test]
    async fn group_names_are_unique() {
        let (service, _) = service();
        let first = service.create_group(group_name("Первая")).await.unwrap();
        service.create_group(group_name("Вторая")).await.unwrap();

        let err = service.create_group(group_name(" Первая ")).await.unwrap_err();
        assert_eq!(err, DirectoryError::Conflict { field: "name" });

        let err = service
            .rename_group(first.id, group_name("Вторая"))
            .await
            .unwrap_err();
        assert_eq!(err, DirectoryError::Conflict { field: "name" });

        let renamed = service
            .rename_group(first.id, group_name("Третья"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Третья");
    }

    #[tokio::test]
    async fn deleting_group_drops_memberships() {
        let (service, _) = service();
        let group = service.create_group(group_name("Временная")).await.unwrap();
        let contact = service
            .create_contact(NewContact {
                group_ids: vec![group.id],
                ..new_contact("anna@example.com", "+79990000001")
            })
            .await
            .unwrap();

        service.delete_group(group.id).await.unwrap();
        let fetched = service.get_contact(contact.id).await.unwrap();
        assert!(fetched.groups.is_empty());

        let err = service.delete_group(group.id).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { entity: "group", .. }));
    }

    #[tokio::test]
    async fn delete_missing_contact_is_not_found() {
        let (service, _) = service();
        let err = service.delete_contact(ContactId::new()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { entity: "contact", .. }));
    }
}
