use std::path::Path;
use std::sync::Arc;
use tracing::info;

use warden_core::authorization::PolicyTables;

use crate::clock::{Clock, SystemClock};
use crate::services::accounts::{AccountService, LogNotifier, OtpNotifier};
use crate::services::authorization::{AuthorizationEngine, PermissionStore};
use crate::services::credentials::{
    AccessTokenRevocationCache, CredentialIssuer, RefreshTokenRegistry, TokenSigner,
};
use crate::settings::config::Settings;
use crate::stop_flag;
use crate::store::{DocumentStore, EphemeralCache, MemoryCache, MemoryStore, TimedCache, TimedStore};

#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    pub stop_flag: stop_flag::StopFlag,
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<dyn EphemeralCache>,
    pub accounts: AccountService,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub async fn new() -> anyhow::Result<SharedAppState> {
        let settings = Settings::new()?;

        let stop_flag = stop_flag::StopFlag::new();
        stop_flag::register_signal_handler(&stop_flag);

        Self::from_settings(
            settings,
            stop_flag,
            Arc::new(LogNotifier::new()),
            Arc::new(SystemClock),
        )
        .await
    }

    /// Wire up every service from `settings`. Notifier and clock are passed
    /// in so tests can observe codes and move time.
    pub async fn from_settings(
        settings: Settings,
        stop_flag: stop_flag::StopFlag,
        notifier: Arc<dyn OtpNotifier>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<SharedAppState> {
        settings.validate()?;

        let tables = match &settings.authorization.policy_path {
            Some(path) => PolicyTables::load(path).await?,
            None => {
                info!("Using built-in capability ceiling and role defaults");
                PolicyTables::builtin()
            }
        };

        let memory = match &settings.store.journal_path {
            Some(path) => MemoryStore::open(Path::new(path)).await?,
            None => {
                info!("No store journal configured, state is kept in memory only");
                MemoryStore::new()
            }
        };
        let io_timeout = settings.store.io_timeout();
        let store: Arc<dyn DocumentStore> = Arc::new(TimedStore::new(Arc::new(memory), io_timeout));
        let cache: Arc<dyn EphemeralCache> =
            Arc::new(TimedCache::new(Arc::new(MemoryCache::new()), io_timeout));

        let max_retries = settings.store.max_write_retries;
        let permissions = PermissionStore::new(store.clone(), Arc::new(tables), max_retries);
        let engine = AuthorizationEngine::new(
            permissions,
            store.clone(),
            settings.authorization.floor_rule,
        );

        let signer = Arc::new(TokenSigner::new(&settings.credentials, clock.clone()));
        let registry = RefreshTokenRegistry::new(
            store.clone(),
            signer.clone(),
            max_retries,
            settings.credentials.revoke_sessions_on_replay,
        );
        let revocations = AccessTokenRevocationCache::new(cache.clone(), clock);
        let issuer = CredentialIssuer::new(signer, registry, revocations);

        let accounts = AccountService::new(
            store.clone(),
            engine,
            issuer,
            cache.clone(),
            notifier,
            &settings.accounts,
        )?;

        Ok(Arc::new(AppState {
            settings,
            stop_flag,
            store,
            cache,
            accounts,
        }))
    }
}
