use axum::{
    extract::{Request, State},
    http::{self, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use warden_core::utils::sensitive_data::mask_email;

use crate::api::error::AppError;
use crate::app_state::SharedAppState;

pub use crate::services::accounts::CurrentPrincipal;

/// The token of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the bearer token to a principal and attach it to the request
pub async fn auth(
    State(state): State<SharedAppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()) else {
        warn!(
            "Missing bearer token | {} {} | user_agent: {:?}",
            req.method(),
            req.uri(),
            req.headers()
                .get("user-agent")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("unknown")
        );
        return Err(AppError::MissingBearerToken);
    };

    let current = match state.accounts.authenticate(token).await {
        Ok(current) => current,
        Err(e) => {
            warn!("Authentication failed for {} {}: {}", req.method(), req.uri(), e);
            return Err(e.into());
        }
    };

    debug!(
        "Principal authenticated: {} <{}>",
        current.principal.id,
        mask_email(&current.principal.email)
    );
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_test::TestServer;
    use std::io;
    use std::sync::{Arc, Mutex};
    use warden_core::authorization::Role;

    use crate::api::router::ApiRoutes;
    use crate::api::test_utils::create_test_context;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_authenticated_principal_is_logged_with_masked_email() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let ctx = create_test_context().await.unwrap();
        let (_, session) = ctx
            .verified_account("grace.hopper@example.org", Role::Admin)
            .await
            .unwrap();
        let server = TestServer::new(ApiRoutes::create(ctx.state.clone())).unwrap();

        let response = server
            .get("/api/v1/permissions/self")
            .add_header(
                http::header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", session.tokens.access_token)).unwrap(),
            )
            .await;
        assert_eq!(response.status_code(), http::StatusCode::OK);

        let logs = logs.contents();
        assert!(logs.contains("Principal authenticated"));
        assert!(logs.contains("g***@example.org"));
        assert!(!logs.contains("grace.hopper@example.org"));
    }
}
