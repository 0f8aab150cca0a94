use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::debug;

use warden_core::principal::PrincipalId;

use crate::services::error::AuthError;
use crate::store::EphemeralCache;

pub const OTP_DIGITS: usize = 6;

/// One-time account verification codes, kept in the ephemeral cache
#[derive(Debug, Clone)]
pub struct OtpStore {
    cache: Arc<dyn EphemeralCache>,
    ttl: Duration,
}

fn generate() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", code, width = OTP_DIGITS)
}

fn same(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

impl OtpStore {
    pub fn new(cache: Arc<dyn EphemeralCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(principal_id: &PrincipalId) -> String {
        format!("otp:{}", principal_id)
    }

    /// Create a fresh code for `principal_id`, replacing any earlier one
    pub async fn issue(&self, principal_id: &PrincipalId) -> Result<String, AuthError> {
        let code = generate();
        self.cache
            .put(&Self::key(principal_id), &code, self.ttl)
            .await?;
        debug!("Issued one-time code for {}", principal_id);
        Ok(code)
    }

    /// Check `code` and use it up. A wrong guess leaves the stored code in
    /// place; only a match consumes it.
    pub async fn consume(&self, principal_id: &PrincipalId, code: &str) -> Result<(), AuthError> {
        let key = Self::key(principal_id);
        let code = code.trim();

        let stored = self.cache.get(&key).await?.ok_or(AuthError::InvalidOtp)?;
        if !same(&stored, code) {
            return Err(AuthError::InvalidOtp);
        }

        // A concurrent verification may have taken it in between
        match self.cache.take(&key).await? {
            Some(taken) if same(&taken, code) => Ok(()),
            _ => Err(AuthError::InvalidOtp),
        }
    }

    pub async fn discard(&self, principal_id: &PrincipalId) -> Result<(), AuthError> {
        self.cache.remove(&Self::key(principal_id)).await?;
        Ok(())
    }
}
