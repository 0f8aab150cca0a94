use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::app_state::SharedAppState;

use super::handlers::auth::{
    login_handler, logout_all_handler, logout_handler, refresh_handler, register_handler,
    resend_otp_handler, verify_account_handler,
};
use super::handlers::health::health_checker_handler;
use super::handlers::permissions::{
    check_permission_handler, grant_permission_handler, my_permissions_handler,
    revoke_permission_handler,
};
use super::handlers::users::{change_role_handler, delete_user_handler};
use super::middleware::auth::auth;

pub struct ApiRoutes;

impl ApiRoutes {
    pub fn create(state: SharedAppState) -> Router {
        let authenticated_router = Router::new()
            .route("/api/v1/auth/logout", post(logout_handler))
            .route("/api/v1/auth/logout-all", post(logout_all_handler))
            .route("/api/v1/permissions/self", get(my_permissions_handler))
            .route("/api/v1/permissions/check", post(check_permission_handler))
            .route(
                "/api/v1/permissions/{target}/grant",
                patch(grant_permission_handler),
            )
            .route(
                "/api/v1/permissions/{target}/revoke",
                patch(revoke_permission_handler),
            )
            .route("/api/v1/users/{target}/role", patch(change_role_handler))
            .route("/api/v1/users/{target}", delete(delete_user_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth));

        let public_router = Router::new()
            .route("/api/v1/health", get(health_checker_handler))
            .route("/api/v1/auth/register", post(register_handler))
            .route("/api/v1/auth/login", post(login_handler))
            .route("/api/v1/auth/verify-account", post(verify_account_handler))
            .route("/api/v1/auth/resend-otp", post(resend_otp_handler))
            .route("/api/v1/auth/refresh", post(refresh_handler));

        Router::new()
            .merge(authenticated_router)
            .merge(public_router)
            .with_state(state)
    }
}
