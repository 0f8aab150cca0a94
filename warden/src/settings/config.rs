use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use warden_core::settings::{
    accounts::AccountSettings, api_server::ApiServer, authorization::AuthorizationSettings,
    credentials::CredentialSettings, interval::Interval, store::StoreSettings,
};

#[derive(Debug, Deserialize, Clone)]
#[readonly::make]
pub struct Scheduler {
    pub cache_purge: Interval,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler {
            cache_purge: Interval::Minutes(1),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiServer,
    pub credentials: CredentialSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub authorization: AuthorizationSettings,
    #[serde(default)]
    pub accounts: AccountSettings,
    #[serde(default)]
    pub scheduler: Scheduler,
}

impl Settings {
    /// Defaults everywhere except the signing secret, which has none
    pub fn with_signing_secret(signing_secret: &str) -> Self {
        Settings {
            api: ApiServer::default(),
            credentials: CredentialSettings::new(signing_secret),
            store: StoreSettings::default(),
            authorization: AuthorizationSettings::default(),
            accounts: AccountSettings::default(),
            scheduler: Scheduler::default(),
        }
    }

    pub fn get_environment() -> Environment {
        Environment::default()
            .prefix("WARDEN")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("WARDEN_RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("api.bind_address", "0.0.0.0:8080")?
            .set_default("scheduler.cache_purge", "1m")?
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Self::get_environment())
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials.validate().map_err(ConfigError::Message)?;
        if self.store.max_write_retries == 0 {
            return Err(ConfigError::Message(
                "store.max_write_retries must be at least 1".to_string(),
            ));
        }
        if let Some(pattern) = &self.accounts.email_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Message(format!("accounts.email_pattern is not a valid regex: {e}"))
            })?;
        }
        Ok(())
    }
}
