//! Shared helpers for API and integration tests

use std::sync::Arc;

use warden_core::authorization::Role;
use warden_core::principal::PrincipalId;

use crate::app_state::{AppState, SharedAppState};
use crate::clock::ManualClock;
use crate::services::accounts::{MemoryNotifier, Registration, Session, VerifyOutcome};
use crate::settings::config::Settings;
use crate::stop_flag::StopFlag;

pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";
pub const TEST_PASSWORD: &str = "Secr3t!pass";

/// An app state plus the handles tests need to look behind it
pub struct TestContext {
    pub state: SharedAppState,
    pub notifier: Arc<MemoryNotifier>,
    pub clock: Arc<ManualClock>,
}

/// Test settings: built-in policy, no journal, cheap password hashing
pub fn test_settings() -> Settings {
    let mut settings = Settings::with_signing_secret(TEST_SIGNING_SECRET);
    settings.accounts.password_hash_cost = 4;
    // Lets tests register elevated accounts directly
    settings.accounts.allow_role_on_registration = true;
    settings
}

pub async fn create_test_context() -> anyhow::Result<TestContext> {
    create_test_context_with_settings(test_settings()).await
}

pub async fn create_test_context_with_settings(settings: Settings) -> anyhow::Result<TestContext> {
    let notifier = Arc::new(MemoryNotifier::new());
    let clock = Arc::new(ManualClock::default());
    let state =
        AppState::from_settings(settings, StopFlag::new(), notifier.clone(), clock.clone()).await?;
    Ok(TestContext {
        state,
        notifier,
        clock,
    })
}

impl TestContext {
    /// Register and verify an account through the service layer
    pub async fn verified_account(&self, email: &str, role: Role) -> anyhow::Result<(PrincipalId, Session)> {
        let principal = self
            .state
            .accounts
            .register(Registration {
                email: email.to_string(),
                password: TEST_PASSWORD.into(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                role: Some(role),
            })
            .await?;
        let code = self
            .notifier
            .last_code(&principal.email)
            .ok_or_else(|| anyhow::anyhow!("no code was sent to {}", principal.email))?;

        match self.state.accounts.verify_account(email, &code).await? {
            VerifyOutcome::Verified(session) => Ok((principal.id, session)),
            VerifyOutcome::AlreadyVerified => anyhow::bail!("{} was already verified", email),
        }
    }
}
