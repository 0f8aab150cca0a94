use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    /// Write-ahead journal; the store is purely in-memory without one
    #[serde(default)]
    pub journal_path: Option<String>,
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,
}

fn default_io_timeout_ms() -> u64 {
    2000
}

fn default_max_write_retries() -> u32 {
    5
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            journal_path: None,
            io_timeout_ms: default_io_timeout_ms(),
            max_write_retries: default_max_write_retries(),
        }
    }
}

impl StoreSettings {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}
