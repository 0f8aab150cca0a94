use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};

use crate::api::error::AppError;
use crate::api::handlers::parse_principal_id;
use crate::app_state::SharedAppState;
use crate::services::accounts::CurrentPrincipal;
use crate::services::authorization::PermissionRequest;

pub async fn my_permissions_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.accounts.permissions_of(&current.principal).await?;
    Ok(Json(document))
}

pub async fn check_permission_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Json(request): Json<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target = request.parse()?;
    let decision = state
        .accounts
        .engine()
        .check(&current.principal, &target)
        .await?;
    Ok(Json(decision))
}

pub async fn grant_permission_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(target_id): Path<String>,
    Json(request): Json<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target_id = parse_principal_id(&target_id)?;
    let target = request.parse()?;
    let outcome = state
        .accounts
        .engine()
        .grant(&current.principal, target_id, &target)
        .await?;
    Ok(Json(serde_json::json!({ "outcome": outcome })))
}

pub async fn revoke_permission_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(target_id): Path<String>,
    Json(request): Json<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target_id = parse_principal_id(&target_id)?;
    let target = request.parse()?;
    let outcome = state
        .accounts
        .engine()
        .revoke(&current.principal, target_id, &target)
        .await?;
    Ok(Json(serde_json::json!({ "outcome": outcome })))
}
