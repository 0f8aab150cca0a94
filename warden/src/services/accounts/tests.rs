use std::sync::Arc;

use warden_core::authorization::{PolicyTables, Resource, Role};
use warden_core::principal::PrincipalId;
use warden_core::settings::accounts::AccountSettings;
use warden_core::settings::credentials::CredentialSettings;

use super::{AccountService, MemoryNotifier, Registration, RoleChange, VerifyOutcome};
use crate::clock::ManualClock;
use crate::services::authorization::{AuthorizationEngine, PermissionStore};
use crate::services::credentials::{
    AccessTokenRevocationCache, CredentialIssuer, RefreshTokenRegistry, TokenSigner,
};
use crate::services::error::{AuthError, DenyReason};
use crate::store::{DocumentStore, MemoryCache, MemoryStore};

const SECRET: &str = "0123456789abcdef0123456789abcdef";
const PASSWORD: &str = "Secr3t!pass";

struct Fixture {
    accounts: AccountService,
    store: Arc<MemoryStore>,
    notifier: Arc<MemoryNotifier>,
}

fn fixture() -> Fixture {
    fixture_with(true)
}

fn fixture_with(allow_role_on_registration: bool) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let clock = Arc::new(ManualClock::default());
    let notifier = Arc::new(MemoryNotifier::new());

    let permissions = PermissionStore::new(store.clone(), Arc::new(PolicyTables::builtin()), 5);
    let engine = AuthorizationEngine::new(permissions, store.clone(), true);
    let signer = Arc::new(TokenSigner::new(&CredentialSettings::new(SECRET), clock.clone()));
    let issuer = CredentialIssuer::new(
        signer.clone(),
        RefreshTokenRegistry::new(store.clone(), signer, 5, true),
        AccessTokenRevocationCache::new(cache.clone(), clock),
    );
    let settings = AccountSettings {
        password_hash_cost: 4,
        allow_role_on_registration,
        ..AccountSettings::default()
    };
    let accounts =
        AccountService::new(store.clone(), engine, issuer, cache, notifier.clone(), &settings)
            .unwrap();

    Fixture {
        accounts,
        store,
        notifier,
    }
}

fn registration(email: &str, role: Option<Role>) -> Registration {
    Registration {
        email: email.to_string(),
        password: PASSWORD.into(),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        role,
    }
}

/// Register and verify; returns the access token of the first session
async fn verified(f: &Fixture, email: &str, role: Role) -> (PrincipalId, String) {
    let summary = f.accounts.register(registration(email, Some(role))).await.unwrap();
    let code = f.notifier.last_code(email).unwrap();
    match f.accounts.verify_account(email, &code).await.unwrap() {
        VerifyOutcome::Verified(session) => (summary.id, session.tokens.access_token),
        VerifyOutcome::AlreadyVerified => panic!("fresh account was already verified"),
    }
}

#[tokio::test]
async fn test_register_creates_unverified_principal_with_document() {
    let f = fixture();
    let summary = f
        .accounts
        .register(registration("Grace@Example.org", None))
        .await
        .unwrap();

    assert_eq!(summary.email, "grace@example.org");
    assert_eq!(summary.role, Role::Student);
    assert!(!summary.is_verified);

    let document = f.store.permissions(&summary.id).await.unwrap().unwrap();
    assert_eq!(
        document.permissions,
        PolicyTables::builtin().defaults_for(Role::Student)
    );
    assert!(f.notifier.last_code("grace@example.org").is_some());
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let f = fixture();
    assert!(matches!(
        f.accounts.register(registration("no-at-sign", None)).await,
        Err(AuthError::InvalidEmail(_))
    ));

    let mut weak = registration("weak@example.org", None);
    weak.password = "password".into();
    assert!(matches!(
        f.accounts.register(weak).await,
        Err(AuthError::WeakPassword(_))
    ));
    assert_eq!(f.store.counts().await, (0, 0));
}

#[tokio::test]
async fn test_register_twice_is_email_taken() {
    let f = fixture();
    f.accounts
        .register(registration("grace@example.org", None))
        .await
        .unwrap();
    assert!(matches!(
        f.accounts
            .register(registration("GRACE@example.org", None))
            .await,
        Err(AuthError::EmailTaken(_))
    ));
}

#[tokio::test]
async fn test_unverified_account_cannot_log_in() {
    let f = fixture();
    f.accounts
        .register(registration("grace@example.org", None))
        .await
        .unwrap();
    assert_eq!(
        f.accounts
            .login("grace@example.org", PASSWORD)
            .await
            .unwrap_err(),
        AuthError::AccountNotVerified
    );
}

#[tokio::test]
async fn test_verification_code_is_single_use() {
    let f = fixture();
    f.accounts
        .register(registration("grace@example.org", None))
        .await
        .unwrap();

    assert_eq!(
        f.accounts
            .verify_account("grace@example.org", "000000x")
            .await
            .unwrap_err(),
        AuthError::InvalidOtp
    );

    let code = f.notifier.last_code("grace@example.org").unwrap();
    let outcome = f
        .accounts
        .verify_account("grace@example.org", &code)
        .await
        .unwrap();
    let VerifyOutcome::Verified(session) = outcome else {
        panic!("expected a session");
    };
    assert!(session.principal.is_verified);
    assert_eq!(session.principal.active_sessions, 1);

    assert!(matches!(
        f.accounts
            .verify_account("grace@example.org", &code)
            .await
            .unwrap(),
        VerifyOutcome::AlreadyVerified
    ));
}

#[tokio::test]
async fn test_resend_replaces_the_code() {
    let f = fixture();
    f.accounts
        .register(registration("grace@example.org", None))
        .await
        .unwrap();
    let first = f.notifier.last_code("grace@example.org").unwrap();

    let mut second = first.clone();
    while second == first {
        f.accounts.resend_otp("grace@example.org").await.unwrap();
        second = f.notifier.last_code("grace@example.org").unwrap();
    }

    assert_eq!(
        f.accounts
            .verify_account("grace@example.org", &first)
            .await
            .unwrap_err(),
        AuthError::InvalidOtp
    );
    assert!(f
        .accounts
        .verify_account("grace@example.org", &second)
        .await
        .is_ok());

    // Unknown addresses are not reported
    assert!(f.accounts.resend_otp("nobody@example.org").await.is_ok());
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let f = fixture();
    verified(&f, "grace@example.org", Role::Student).await;

    assert_eq!(
        f.accounts
            .login("grace@example.org", "Wr0ng!pass")
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
    assert_eq!(
        f.accounts
            .login("nobody@example.org", PASSWORD)
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
}

#[tokio::test]
async fn test_login_refresh_and_logout() {
    let f = fixture();
    verified(&f, "grace@example.org", Role::Admin).await;

    let session = f
        .accounts
        .login("grace@example.org", PASSWORD)
        .await
        .unwrap();
    assert_eq!(session.principal.active_sessions, 2);

    let current = f
        .accounts
        .authenticate(&session.tokens.access_token)
        .await
        .unwrap();
    assert_eq!(current.principal.email, "grace@example.org");

    let refreshed = f
        .accounts
        .refresh(&session.tokens.refresh_token)
        .await
        .unwrap();
    let current = f
        .accounts
        .authenticate(&refreshed.tokens.access_token)
        .await
        .unwrap();

    f.accounts
        .logout(&current, Some(&refreshed.tokens.refresh_token))
        .await
        .unwrap();

    assert_eq!(
        f.accounts
            .authenticate(&refreshed.tokens.access_token)
            .await
            .unwrap_err(),
        AuthError::TokenRevoked
    );
    assert_eq!(
        f.accounts
            .refresh(&refreshed.tokens.refresh_token)
            .await
            .unwrap_err(),
        AuthError::ReplayDetected
    );
}

#[tokio::test]
async fn test_logout_with_foreign_refresh_token() {
    let f = fixture();
    let (_, grace_token) = verified(&f, "grace@example.org", Role::Admin).await;
    verified(&f, "alan@example.org", Role::Admin).await;
    let alan = f.accounts.login("alan@example.org", PASSWORD).await.unwrap();

    let current = f.accounts.authenticate(&grace_token).await.unwrap();
    assert_eq!(
        f.accounts
            .logout(&current, Some(&alan.tokens.refresh_token))
            .await
            .unwrap_err(),
        AuthError::MalformedToken
    );
    assert!(f.accounts.refresh(&alan.tokens.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_logout_all_ends_every_session() {
    let f = fixture();
    let (id, access) = verified(&f, "grace@example.org", Role::Admin).await;
    let other = f
        .accounts
        .login("grace@example.org", PASSWORD)
        .await
        .unwrap();

    let current = f.accounts.authenticate(&access).await.unwrap();
    assert_eq!(f.accounts.logout_all(&current).await.unwrap(), 2);

    assert_eq!(
        f.accounts
            .refresh(&other.tokens.refresh_token)
            .await
            .unwrap_err(),
        AuthError::ReplayDetected
    );
    let stored = f.store.principal(&id).await.unwrap().unwrap();
    assert!(stored.refresh_tokens.is_empty());
}

#[tokio::test]
async fn test_change_role_reseeds_permissions() {
    let f = fixture();
    let (root_id, root_token) = verified(&f, "root@example.org", Role::SuperAdmin).await;
    let (student_id, _) = verified(&f, "student@example.org", Role::Student).await;
    let root = f.accounts.authenticate(&root_token).await.unwrap().principal;
    assert_eq!(root.id, root_id);

    let RoleChange::Changed { principal } = f
        .accounts
        .change_role(&root, student_id, Role::Admin)
        .await
        .unwrap()
    else {
        panic!("expected a role change");
    };
    assert_eq!(principal.role, Role::Admin);

    let stored = f.store.principal(&student_id).await.unwrap().unwrap();
    let document = f.accounts.permissions_of(&stored).await.unwrap();
    assert_eq!(document.role, Role::Admin);
    assert_eq!(
        document.permissions,
        PolicyTables::builtin().defaults_for(Role::Admin)
    );

    assert!(matches!(
        f.accounts
            .change_role(&root, student_id, Role::Admin)
            .await
            .unwrap(),
        RoleChange::Unchanged
    ));
}

#[tokio::test]
async fn test_only_super_admin_changes_roles() {
    let f = fixture();
    let (_, admin_token) = verified(&f, "admin@example.org", Role::Admin).await;
    let (student_id, _) = verified(&f, "student@example.org", Role::Student).await;
    let admin = f.accounts.authenticate(&admin_token).await.unwrap().principal;

    assert!(matches!(
        f.accounts
            .change_role(&admin, student_id, Role::SuperAdmin)
            .await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(matches!(
        f.accounts
            .change_role(&admin, PrincipalId::new(), Role::SuperAdmin)
            .await,
        Err(AuthError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_delete_account_scopes() {
    let f = fixture();
    let (_, admin_token) = verified(&f, "admin@example.org", Role::Admin).await;
    let (_, root_token) = verified(&f, "root@example.org", Role::SuperAdmin).await;
    let (student_id, student_token) = verified(&f, "student@example.org", Role::Student).await;
    let admin = f.accounts.authenticate(&admin_token).await.unwrap().principal;
    let root = f.accounts.authenticate(&root_token).await.unwrap().principal;

    // Admins hold users/delete only on their own account
    assert_eq!(
        f.accounts.delete_account(&admin, student_id).await,
        Err(AuthError::Denied(DenyReason::NotGranted))
    );

    f.accounts.delete_account(&root, student_id).await.unwrap();
    assert!(f.store.principal(&student_id).await.unwrap().is_none());
    assert!(f.store.permissions(&student_id).await.unwrap().is_none());
    assert_eq!(
        f.accounts.authenticate(&student_token).await.unwrap_err(),
        AuthError::LoginRequired
    );

    assert_eq!(
        f.accounts.delete_account(&root, student_id).await,
        Err(AuthError::PrincipalNotFound(student_id))
    );

    f.accounts.delete_account(&admin, admin.id).await.unwrap();
    assert!(f.store.principal(&admin.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unverified_principal_is_denied_beyond_verification() {
    let f = fixture();
    let summary = f
        .accounts
        .register(registration("grace@example.org", Some(Role::SuperAdmin)))
        .await
        .unwrap();
    let principal = f.store.principal(&summary.id).await.unwrap().unwrap();

    assert_eq!(
        f.accounts.delete_account(&principal, summary.id).await,
        Err(AuthError::Denied(DenyReason::Unverified))
    );
    let document = f.accounts.permissions_of(&principal).await.unwrap();
    assert!(document.entry(Resource::Users).is_some());
}

#[tokio::test]
async fn test_registering_an_elevated_role_needs_the_setting() {
    let f = fixture_with(false);

    assert!(matches!(
        f.accounts
            .register(registration("eve@example.org", Some(Role::SuperAdmin)))
            .await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(f.store.principal_by_email("eve@example.org").await.unwrap().is_none());

    let summary = f
        .accounts
        .register(registration("eve@example.org", Some(Role::Student)))
        .await
        .unwrap();
    assert_eq!(summary.role, Role::Student);
}
