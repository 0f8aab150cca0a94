pub mod auth;
pub mod health;
pub mod permissions;
pub mod users;

use warden_core::principal::PrincipalId;

use crate::api::error::AppError;

/// Principal ids arrive as path segments
pub(crate) fn parse_principal_id(raw: &str) -> Result<PrincipalId, AppError> {
    PrincipalId::parse(raw).ok_or_else(|| AppError::InvalidInput(format!("not a principal id: {}", raw)))
}
