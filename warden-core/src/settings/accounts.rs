use serde::Deserialize;

use super::interval::Interval;

#[derive(Debug, Deserialize, Clone)]
pub struct AccountSettings {
    /// Overrides the built-in email pattern
    #[serde(default)]
    pub email_pattern: Option<String>,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl: Interval,
    /// Let registrants pick a role above the lowest one. Only meant for
    /// bootstrapping the first super_admin.
    #[serde(default)]
    pub allow_role_on_registration: bool,
}

fn default_password_hash_cost() -> u32 {
    10
}

fn default_otp_ttl() -> Interval {
    Interval::Minutes(5)
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            email_pattern: None,
            password_hash_cost: default_password_hash_cost(),
            otp_ttl: default_otp_ttl(),
            allow_role_on_registration: false,
        }
    }
}
