use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use tracing::info;

use warden_core::utils::sensitive_data::mask_email;

/// Delivers one-time codes to account holders
#[async_trait]
pub trait OtpNotifier: Send + Sync + Debug {
    async fn send_otp(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes codes to the log; for development setups without mail delivery
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        LogNotifier {}
    }
}

#[async_trait]
impl OtpNotifier for LogNotifier {
    async fn send_otp(&self, email: &str, code: &str) -> anyhow::Result<()> {
        info!("One-time code for {}: {}", mask_email(email), code);
        Ok(())
    }
}

/// Keeps the last code per address in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    codes: Mutex<HashMap<String, String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_code(&self, email: &str) -> Option<String> {
        self.codes
            .lock()
            .ok()
            .and_then(|codes| codes.get(email).cloned())
    }
}

#[async_trait]
impl OtpNotifier for MemoryNotifier {
    async fn send_otp(&self, email: &str, code: &str) -> anyhow::Result<()> {
        self.codes
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier state poisoned"))?
            .insert(email.to_string(), code.to_string());
        Ok(())
    }
}
