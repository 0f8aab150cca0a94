use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use warden_core::authorization::Role;

use crate::api::router::ApiRoutes;
use crate::api::test_utils::{create_test_context, TestContext};

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn create_server() -> (TestServer, TestContext) {
    let ctx = create_test_context().await.unwrap();
    let server = TestServer::new(ApiRoutes::create(ctx.state.clone())).unwrap();
    (server, ctx)
}

#[tokio::test]
async fn test_check_distinguishes_denials_from_bad_input() {
    let (server, ctx) = create_server().await;
    let (_, student) = ctx
        .verified_account("student@example.org", Role::Student)
        .await
        .unwrap();
    let token = bearer(&student.tokens.access_token);

    let response = server
        .post("/api/v1/permissions/check")
        .add_header(AUTHORIZATION, token.clone())
        .json(&json!({ "resource": "announcements", "action": "read" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "decision": "allow" }));

    let response = server
        .post("/api/v1/permissions/check")
        .add_header(AUTHORIZATION, token.clone())
        .json(&json!({ "resource": "announcements", "action": "delete", "scope": "own" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "decision": "deny", "reason": "floor_rule" })
    );

    for bad in [
        json!({ "resource": "notifications", "action": "read" }),
        json!({ "resource": "announcements", "action": "update" }),
        json!({ "resource": "announcements", "action": "*" }),
        json!({ "resource": "announcements", "action": "read", "scope": "everyone" }),
    ] {
        let response = server
            .post("/api/v1/permissions/check")
            .add_header(AUTHORIZATION, token.clone())
            .json(&bad)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "{}", bad);
        assert_eq!(response.json::<Value>()["kind"], "input");
    }
}

#[tokio::test]
async fn test_grant_and_revoke_over_http() {
    let (server, ctx) = create_server().await;
    let (_, root) = ctx
        .verified_account("root@example.org", Role::SuperAdmin)
        .await
        .unwrap();
    let (admin_id, admin) = ctx
        .verified_account("admin@example.org", Role::Admin)
        .await
        .unwrap();
    let grant_path = format!("/api/v1/permissions/{}/grant", admin_id);
    let revoke_path = format!("/api/v1/permissions/{}/revoke", admin_id);
    let triple = json!({ "resource": "announcements", "action": "delete", "scope": "others" });

    let check = || {
        server
            .post("/api/v1/permissions/check")
            .add_header(AUTHORIZATION, bearer(&admin.tokens.access_token))
            .json(&triple)
    };
    assert_eq!(check().await.json::<Value>()["decision"], "deny");

    let response = server
        .patch(&grant_path)
        .add_header(AUTHORIZATION, bearer(&root.tokens.access_token))
        .json(&triple)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["outcome"], "granted");

    let response = server
        .patch(&grant_path)
        .add_header(AUTHORIZATION, bearer(&root.tokens.access_token))
        .json(&triple)
        .await;
    assert_eq!(response.json::<Value>()["outcome"], "already_held");
    assert_eq!(check().await.json::<Value>()["decision"], "allow");

    let response = server
        .patch(&revoke_path)
        .add_header(AUTHORIZATION, bearer(&root.tokens.access_token))
        .json(&triple)
        .await;
    assert_eq!(response.json::<Value>()["outcome"], "revoked");
    assert_eq!(check().await.json::<Value>()["decision"], "deny");

    // Beyond the ceiling
    let response = server
        .patch(&grant_path)
        .add_header(AUTHORIZATION, bearer(&root.tokens.access_token))
        .json(&json!({ "resource": "announcements", "action": "update", "scope": "others" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // Only a super_admin may grant
    let response = server
        .patch(&grant_path)
        .add_header(AUTHORIZATION, bearer(&admin.tokens.access_token))
        .json(&triple)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["kind"], "forbidden");

    let response = server
        .patch("/api/v1/permissions/not-an-id/grant")
        .add_header(AUTHORIZATION, bearer(&root.tokens.access_token))
        .json(&triple)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_change_and_account_deletion() {
    let (server, ctx) = create_server().await;
    let (_, root) = ctx
        .verified_account("root@example.org", Role::SuperAdmin)
        .await
        .unwrap();
    let (student_id, student) = ctx
        .verified_account("student@example.org", Role::Student)
        .await
        .unwrap();
    let root_token = bearer(&root.tokens.access_token);

    let response = server
        .patch(&format!("/api/v1/users/{}/role", student_id))
        .add_header(AUTHORIZATION, root_token.clone())
        .json(&json!({ "role": "admin" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "changed");
    assert_eq!(body["principal"]["role"], "admin");

    let response = server
        .patch(&format!("/api/v1/users/{}/role", student_id))
        .add_header(AUTHORIZATION, root_token.clone())
        .json(&json!({ "role": "admin" }))
        .await;
    assert_eq!(response.json::<Value>()["status"], "unchanged");

    let response = server
        .patch(&format!("/api/v1/users/{}/role", student_id))
        .add_header(AUTHORIZATION, root_token.clone())
        .json(&json!({ "role": "overlord" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // The promoted account sees its new defaults on the next request
    let response = server
        .get("/api/v1/permissions/self")
        .add_header(AUTHORIZATION, bearer(&student.tokens.access_token))
        .await;
    assert_eq!(response.json::<Value>()["role"], "admin");

    let response = server
        .delete(&format!("/api/v1/users/{}", student_id))
        .add_header(AUTHORIZATION, root_token.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = server
        .get("/api/v1/permissions/self")
        .add_header(AUTHORIZATION, bearer(&student.tokens.access_token))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .delete(&format!("/api/v1/users/{}", student_id))
        .add_header(AUTHORIZATION, root_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
