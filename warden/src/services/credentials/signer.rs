use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use warden_core::principal::{Principal, PrincipalId};
use warden_core::settings::credentials::CredentialSettings;

use crate::clock::Clock;
use crate::services::error::AuthError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: PrincipalId,
    pub email: String,
    pub kind: TokenKind,
    /// Makes every token unique, even two minted in the same second
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// A freshly minted token together with its claims
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: Claims,
}

/// Stable digest of a token; registries and denylists keep this instead of
/// the token itself.
pub fn fingerprint(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// HS256 signing and verification of access and refresh tokens.
///
/// Expiry is compared against the injected clock rather than by the JWT
/// library, so tests control time.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(settings: &CredentialSettings, clock: Arc<dyn Clock>) -> Self {
        let secret = settings.signing_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[settings.issuer.as_str()]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: settings.issuer.clone(),
            access_ttl: settings.access_token_ttl.into(),
            refresh_ttl: settings.refresh_token_ttl.into(),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Mint a token of `kind` for `principal`, valid for `ttl`
    pub fn sign(
        &self,
        principal: &Principal,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<SignedToken, AuthError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal(format!("token lifetime {} is out of range", ttl)))?;
        let claims = Claims {
            sub: principal.id,
            email: principal.email.clone(),
            kind,
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {}", e)))?;
        Ok(SignedToken { token, claims })
    }

    pub fn access_token(&self, principal: &Principal) -> Result<SignedToken, AuthError> {
        self.sign(principal, TokenKind::Access, self.access_ttl)
    }

    pub fn refresh_token(&self, principal: &Principal) -> Result<SignedToken, AuthError> {
        self.sign(principal, TokenKind::Refresh, self.refresh_ttl)
    }

    /// Check signature, issuer and kind; expiry is not looked at
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token.trim(), &self.decoding, &self.validation).map_err(|e| {
            debug!("Rejected token: {}", e);
            AuthError::MalformedToken
        })?;
        if data.claims.kind != kind {
            debug!(
                "Rejected token: expected {:?}, got {:?}",
                kind, data.claims.kind
            );
            return Err(AuthError::MalformedToken);
        }
        Ok(data.claims)
    }

    /// `decode` plus an expiry check against the clock
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.decode(token, kind)?;
        if claims.is_expired(self.clock.now()) {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}
