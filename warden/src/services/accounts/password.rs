use tracing::error;

use crate::services::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 6;
const BCRYPT_COST_RANGE: (u32, u32) = (4, 31);

/// Reject passwords that miss a length, case, digit or symbol requirement
pub fn check_strength(password: &str) -> Result<(), AuthError> {
    let mut missing = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        missing.push(format!("at least {} characters", MIN_PASSWORD_LEN));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        missing.push("an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        missing.push("a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit".to_string());
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        missing.push("a special character".to_string());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakPassword(format!("needs {}", missing.join(", "))))
    }
}

/// bcrypt hashing, run on the blocking pool
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(BCRYPT_COST_RANGE.0, BCRYPT_COST_RANGE.1),
        }
    }

    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?
            .map_err(|e| {
                error!("Failed to hash password: {}", e);
                AuthError::Internal("failed to hash password".to_string())
            })
    }

    /// A malformed stored hash counts as a mismatch
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hash = hash.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?;
        Ok(matches.unwrap_or_else(|e| {
            error!("Stored password hash is unusable: {}", e);
            false
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_rules() {
        assert!(check_strength("Secr3t!").is_ok());
        for weak in ["S3t!", "secr3t!", "SECR3T!", "Secret!", "Secr3ts"] {
            assert!(
                matches!(check_strength(weak), Err(AuthError::WeakPassword(_))),
                "{} should be rejected",
                weak
            );
        }
    }

    #[test]
    fn test_strength_error_lists_what_is_missing() {
        let Err(AuthError::WeakPassword(reason)) = check_strength("abc") else {
            panic!("expected a weak password");
        };
        assert!(reason.contains("at least 6 characters"));
        assert!(reason.contains("a digit"));
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("Secr3t!").await.unwrap();
        assert_ne!(hash, "Secr3t!");
        assert!(hasher.verify("Secr3t!", &hash).await.unwrap());
        assert!(!hasher.verify("secr3t!", &hash).await.unwrap());
        assert!(!hasher.verify("Secr3t!", "not-a-hash").await.unwrap());
    }
}
