use serde::Deserialize;

use super::interval::Interval;
use crate::utils::secret::MaskedSecret;

pub const MIN_SIGNING_SECRET_LEN: usize = 32;

/// Upper bound for any token lifetime
pub const MAX_TOKEN_TTL_SECS: u64 = 366 * 24 * 60 * 60;

/// Signing and lifetime settings for access and refresh tokens
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialSettings {
    pub signing_secret: MaskedSecret,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: Interval,
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: Interval,
    /// Revoke every session of a principal when a rotated refresh token
    /// is presented again
    #[serde(default = "default_revoke_sessions_on_replay")]
    pub revoke_sessions_on_replay: bool,
}

fn default_issuer() -> String {
    "warden".to_string()
}

fn default_access_token_ttl() -> Interval {
    Interval::Minutes(5)
}

fn default_refresh_token_ttl() -> Interval {
    Interval::Days(7)
}

fn default_revoke_sessions_on_replay() -> bool {
    true
}

impl CredentialSettings {
    pub fn new(signing_secret: &str) -> Self {
        Self {
            signing_secret: MaskedSecret::from(signing_secret),
            issuer: default_issuer(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            revoke_sessions_on_replay: default_revoke_sessions_on_replay(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.signing_secret.expose_secret().len() < MIN_SIGNING_SECRET_LEN {
            return Err(format!(
                "credentials.signing_secret must be at least {} bytes",
                MIN_SIGNING_SECRET_LEN
            ));
        }
        if self.access_token_ttl.as_secs() == 0 || self.refresh_token_ttl.as_secs() == 0 {
            return Err("token lifetimes must be greater than zero".to_string());
        }
        if self.refresh_token_ttl.as_secs() > MAX_TOKEN_TTL_SECS {
            return Err(format!(
                "credentials.refresh_token_ttl must not exceed {} days",
                MAX_TOKEN_TTL_SECS / (24 * 60 * 60)
            ));
        }
        if self.access_token_ttl.as_secs() >= self.refresh_token_ttl.as_secs() {
            return Err(
                "credentials.access_token_ttl must be shorter than refresh_token_ttl".to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_only_secret_is_set() {
        let yaml = "signing_secret: 0123456789abcdef0123456789abcdef\n";
        let settings: CredentialSettings = serde_norway::from_str(yaml).unwrap();
        assert_eq!(settings.access_token_ttl, Interval::Minutes(5));
        assert_eq!(settings.refresh_token_ttl, Interval::Days(7));
        assert!(settings.revoke_sessions_on_replay);
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn test_short_secret_is_rejected() {
        assert!(CredentialSettings::new("too-short").validate().is_err());
    }

    #[test]
    fn test_access_ttl_must_be_shorter() {
        let mut settings = CredentialSettings::new("0123456789abcdef0123456789abcdef");
        settings.access_token_ttl = Interval::Days(8);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        let mut settings = CredentialSettings::new("0123456789abcdef0123456789abcdef");
        settings.refresh_token_ttl = Interval::Days(u32::MAX);
        assert!(settings.validate().is_err());

        settings.refresh_token_ttl = Interval::Days(366);
        assert_eq!(settings.validate(), Ok(()));
    }
}
