use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::Deserialize;
use tracing::debug;

use warden_core::utils::secret::MaskedSecret;

use crate::api::error::AppError;
use crate::app_state::SharedAppState;
use crate::services::accounts::{CurrentPrincipal, Registration};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: MaskedSecret,
}

#[derive(Debug, Deserialize)]
pub struct VerifyAccountRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

pub async fn register_handler(
    State(state): State<SharedAppState>,
    Json(registration): Json<Registration>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.accounts.register(registration).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "message": "A one-time code has been sent to your email",
            "principal": principal,
        })),
    ))
}

pub async fn verify_account_handler(
    State(state): State<SharedAppState>,
    Json(form): Json<VerifyAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.accounts.verify_account(&form.email, &form.otp).await?;
    Ok(Json(outcome))
}

pub async fn resend_otp_handler(
    State(state): State<SharedAppState>,
    Json(form): Json<ResendOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.resend_otp(&form.email).await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "If the account exists and is not verified, a new code is on its way",
    })))
}

pub async fn login_handler(
    State(state): State<SharedAppState>,
    Json(form): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Login attempt");
    let session = state
        .accounts
        .login(&form.email, form.password.expose_secret())
        .await?;
    Ok(Json(session))
}

pub async fn refresh_handler(
    State(state): State<SharedAppState>,
    Json(form): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.accounts.refresh(&form.refresh_token).await?;
    Ok(Json(session))
}

pub async fn logout_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Json(form): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .logout(&current, form.refresh_token.as_deref())
        .await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Logged out",
    })))
}

pub async fn logout_all_handler(
    State(state): State<SharedAppState>,
    Extension(current): Extension<CurrentPrincipal>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state.accounts.logout_all(&current).await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Logged out of all devices",
        "sessions": sessions,
    })))
}
