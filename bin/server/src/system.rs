//! System settings routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use rim_platform_access::DebugModeStatus;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::auth::RequireAdmin;
use crate::error::{ApiError, json_body};

#[derive(Debug, Deserialize)]
pub struct DebugModeRequest {
    pub enabled: bool,
}

/// Reports whether debug mode is on, and why.
pub async fn debug_mode(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DebugModeStatus>, ApiError> {
    Ok(Json(state.system.status().await?))
}

/// Persists the debug-mode flag. Administrators only.
pub async fn set_debug_mode(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<DebugModeRequest>, JsonRejection>,
) -> Result<Json<DebugModeStatus>, ApiError> {
    let request = json_body(payload)?;
    state.system.set_debug_mode(request.enabled).await?;
    info!(
        user_id = %admin.user_id(),
        enabled = request.enabled,
        "debug mode changed"
    );
    Ok(Json(state.system.status().await?))
}
