use axum::http::StatusCode;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::services::error::{AuthError, ErrorKind};

#[derive(Clone, Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing bearer token")]
    MissingBearerToken,

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    fn kind(&self) -> ErrorKind {
        match self {
            AppError::Auth(e) => e.kind(),
            AppError::InvalidInput(_) => ErrorKind::Input,
            AppError::MissingBearerToken => ErrorKind::Unauthenticated,
            AppError::InternalServerError(_) => ErrorKind::Internal,
        }
    }

    fn get_error_msg(&self) -> (StatusCode, ErrorKind, String) {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::Input => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden | ErrorKind::Denied => StatusCode::FORBIDDEN,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, kind, self.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        if let Some(app_error) = e.downcast_ref::<AppError>() {
            return app_error.clone();
        }
        AppError::InternalServerError(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.get_error_msg();
        if status.is_server_error() {
            error!("Request failed: {}", message);
        }
        let mut body = serde_json::json!({ "error": true, "kind": kind, "message": message });
        if let AppError::Auth(AuthError::Denied(reason)) = &self {
            body["reason"] = serde_json::json!(reason);
        }
        let mut response = (status, Json(body)).into_response();
        if matches!(&self, AppError::Auth(e) if e.is_retryable()) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}
