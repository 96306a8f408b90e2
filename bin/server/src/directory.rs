//! Contact and group routes.
//!
//! Reads are open: anonymous callers see contact names only, signed-in
//! users see full records. Every write requires an administrator.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rim_core::{ContactId, GroupId};
use rim_directory::{Contact, ContactChanges, Group, GroupName, NewContact};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::auth::{OptionalAuth, RequireAdmin, RequireAuth};
use crate::error::{ApiError, json_body, parse_id};

/// What an anonymous caller may see of a contact.
#[derive(Debug, Serialize)]
pub struct ContactSummary {
    pub id: ContactId,
    pub name: String,
}

impl From<Contact> for ContactSummary {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            name: contact.name,
        }
    }
}

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    OptionalAuth(auth): OptionalAuth,
) -> Result<Response, ApiError> {
    let contacts = state.directory.list_contacts().await?;
    if auth.is_some() {
        return Ok(Json(contacts).into_response());
    }
    let summaries: Vec<ContactSummary> = contacts.into_iter().map(Into::into).collect();
    Ok(Json(summaries).into_response())
}

pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Contact>, ApiError> {
    let id: ContactId = parse_id(&id, "contact")?;
    Ok(Json(state.directory.get_contact(id).await?))
}

pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<NewContact>, JsonRejection>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    let contact = state.directory.create_contact(json_body(payload)?).await?;
    info!(user_id = %admin.user_id(), contact_id = %contact.id, "contact created");
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<ContactChanges>, JsonRejection>,
) -> Result<Json<Contact>, ApiError> {
    let id: ContactId = parse_id(&id, "contact")?;
    let contact = state
        .directory
        .update_contact(id, json_body(payload)?)
        .await?;
    info!(user_id = %admin.user_id(), contact_id = %id, "contact updated");
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ContactId = parse_id(&id, "contact")?;
    state.directory.delete_contact(id).await?;
    info!(user_id = %admin.user_id(), contact_id = %id, "contact deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_to_group(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    Path((contact_id, group_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let contact_id: ContactId = parse_id(&contact_id, "contact")?;
    let group_id: GroupId = parse_id(&group_id, "group")?;
    state
        .directory
        .add_contact_to_group(contact_id, group_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_from_group(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    Path((contact_id, group_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let contact_id: ContactId = parse_id(&contact_id, "contact")?;
    let group_id: GroupId = parse_id(&group_id, "group")?;
    state
        .directory
        .remove_contact_from_group(contact_id, group_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_groups(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.directory.list_groups().await?))
}

pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    let id: GroupId = parse_id(&id, "group")?;
    Ok(Json(state.directory.get_group(id).await?))
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<GroupName>, JsonRejection>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = state.directory.create_group(json_body(payload)?).await?;
    info!(user_id = %admin.user_id(), group_id = %group.id, name = %group.name, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn rename_group(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<GroupName>, JsonRejection>,
) -> Result<Json<Group>, ApiError> {
    let id: GroupId = parse_id(&id, "group")?;
    let group = state
        .directory
        .rename_group(id, json_body(payload)?)
        .await?;
    info!(user_id = %admin.user_id(), group_id = %id, name = %group.name, "group renamed");
    Ok(Json(group))
}

pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: GroupId = parse_id(&id, "group")?;
    state.directory.delete_group(id).await?;
    info!(user_id = %admin.user_id(), group_id = %id, "group deleted");
    Ok(StatusCode::NO_CONTENT)
}
