use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use warden_core::authorization::Role;

use crate::api::error::AppError;
use crate::api::handlers::parse_principal_id;
use crate::app_state::SharedAppState;
use crate::services::accounts::CurrentPrincipal;

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

pub async fn change_role_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(target_id): Path<String>,
    Json(form): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target_id = parse_principal_id(&target_id)?;
    let role = Role::from_str(&form.role)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown role: {}", form.role)))?;
    let change = state
        .accounts
        .change_role(&current.principal, target_id, role)
        .await?;
    Ok(Json(change))
}

pub async fn delete_user_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(target_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let target_id = parse_principal_id(&target_id)?;
    state
        .accounts
        .delete_account(&current.principal, target_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
