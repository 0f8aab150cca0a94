use axum::{response::IntoResponse, Json};

pub async fn health_checker_handler() -> impl IntoResponse {
    let json_response = serde_json::json!({
        "status": "success",
        "message": "warden is up",
        "version": env!("CARGO_PKG_VERSION"),
    });

    Json(json_response)
}
