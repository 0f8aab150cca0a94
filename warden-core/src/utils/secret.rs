//! Secret handling using the secrecy crate with partial masking
//!
//! `MaskedSecret` keeps signing keys and password hashes out of logs while
//! still serializing the full value where it has to be persisted.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::sensitive_data::mask_sensitive_value;

/// A secret string that provides memory protection via the secrecy crate
/// while showing partial masking in Debug output for usability.
///
/// # Example
/// ```
/// use warden_core::utils::secret::MaskedSecret;
///
/// let key = MaskedSecret::new("signing-key-0123".to_string());
/// assert_eq!(format!("{:?}", key), "\"*******-***-0123\"");
/// assert_eq!(key.expose_secret(), "signing-key-0123");
/// ```
#[derive(Clone)]
pub struct MaskedSecret(SecretString);

impl MaskedSecret {
    pub fn new(value: String) -> Self {
        Self(SecretString::new(value.into_boxed_str()))
    }

    /// Expose the secret value, only where it is actually needed
    /// (signing, hash verification, persisting)
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl From<&str> for MaskedSecret {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl std::fmt::Debug for MaskedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = mask_sensitive_value(self.0.expose_secret());
        write!(f, "\"{}\"", masked)
    }
}

impl std::fmt::Display for MaskedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = mask_sensitive_value(self.0.expose_secret());
        write!(f, "{}", masked)
    }
}

impl Serialize for MaskedSecret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Full value, the store journal needs it
        self.0.expose_secret().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MaskedSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(MaskedSecret::new(value))
    }
}

impl PartialEq for MaskedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.expose_secret() == other.0.expose_secret()
    }
}

impl Eq for MaskedSecret {}
