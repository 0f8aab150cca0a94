use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use warden_core::authorization::{Action, PermissionDocument, Resource, Role, Scope};
use warden_core::principal::{normalize_email, Principal, PrincipalId, PrincipalSummary};
use warden_core::settings::accounts::AccountSettings;
use warden_core::utils::sensitive_data::mask_email;

use super::notifier::OtpNotifier;
use super::otp::OtpStore;
use super::password::{check_strength, PasswordHasher};
use super::{CurrentPrincipal, Registration, RoleChange, Session, VerifyOutcome};
use crate::services::authorization::AuthorizationEngine;
use crate::services::credentials::{CredentialIssuer, TokenKind, TokenPair};
use crate::services::error::AuthError;
use crate::store::{DocumentStore, EphemeralCache, StoreError, WriteOp};

const DEFAULT_EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

#[derive(Debug, Clone)]
pub struct AccountService {
    store: Arc<dyn DocumentStore>,
    engine: AuthorizationEngine,
    issuer: CredentialIssuer,
    otps: OtpStore,
    notifier: Arc<dyn OtpNotifier>,
    passwords: PasswordHasher,
    email_pattern: Regex,
    allow_role_on_registration: bool,
    max_retries: u32,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        engine: AuthorizationEngine,
        issuer: CredentialIssuer,
        cache: Arc<dyn EphemeralCache>,
        notifier: Arc<dyn OtpNotifier>,
        settings: &AccountSettings,
    ) -> anyhow::Result<Self> {
        let pattern = settings
            .email_pattern
            .as_deref()
            .unwrap_or(DEFAULT_EMAIL_PATTERN);
        let email_pattern = Regex::new(pattern)
            .map_err(|e| anyhow::anyhow!("Invalid email pattern '{}': {}", pattern, e))?;
        let max_retries = engine.permission_store().max_retries();

        Ok(Self {
            store,
            engine,
            issuer,
            otps: OtpStore::new(cache, settings.otp_ttl.into()),
            notifier,
            passwords: PasswordHasher::new(settings.password_hash_cost),
            email_pattern,
            allow_role_on_registration: settings.allow_role_on_registration,
            max_retries,
        })
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    async fn send_otp(&self, principal: &Principal) -> Result<(), AuthError> {
        let code = self.otps.issue(&principal.id).await?;
        if let Err(e) = self.notifier.send_otp(&principal.email, &code).await {
            // The account exists either way; the holder can ask for a new code
            warn!(
                "Could not deliver one-time code to {}: {}",
                mask_email(&principal.email),
                e
            );
        }
        Ok(())
    }

    /// Create an unverified account together with its permission document
    #[instrument(skip_all, fields(email = %mask_email(&registration.email)))]
    pub async fn register(&self, registration: Registration) -> Result<PrincipalSummary, AuthError> {
        let email = normalize_email(&registration.email);
        if !self.email_pattern.is_match(&email) {
            return Err(AuthError::InvalidEmail(registration.email));
        }
        check_strength(registration.password.expose_secret())?;

        let role = match registration.role {
            Some(role) if role != Role::lowest() && !self.allow_role_on_registration => {
                warn!("Registration asked for role '{}'", role);
                return Err(AuthError::Forbidden(format!(
                    "role '{}' can only be assigned by a super_admin",
                    role
                )));
            }
            Some(role) => role,
            None => Role::lowest(),
        };

        if self.store.principal_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken(email));
        }

        let hash = self
            .passwords
            .hash(registration.password.expose_secret())
            .await?;
        let mut principal = Principal::new(
            &email,
            &registration.first_name,
            &registration.last_name,
            role,
            hash,
        );
        let document = self.engine.permission_store().seed(principal.id, role);

        match self
            .store
            .commit(vec![
                WriteOp::PutPrincipal(principal.clone()),
                WriteOp::PutPermissions(document),
            ])
            .await
        {
            Ok(()) => principal.version += 1,
            Err(StoreError::UniqueViolation(_)) => return Err(AuthError::EmailTaken(email)),
            Err(e) => return Err(e.into()),
        }
        info!("Registered {} as {}", principal.id, role);

        self.send_otp(&principal).await?;
        Ok(PrincipalSummary::from(&principal))
    }

    /// Send a new one-time code. Unknown and already verified addresses are
    /// accepted silently so the endpoint does not reveal who has an account.
    #[instrument(skip_all)]
    pub async fn resend_otp(&self, email: &str) -> Result<(), AuthError> {
        match self.store.principal_by_email(email).await? {
            Some(principal) if !principal.is_verified => self.send_otp(&principal).await,
            Some(_) => {
                debug!("Not resending code to verified {}", mask_email(email));
                Ok(())
            }
            None => {
                debug!("Not resending code to unknown {}", mask_email(email));
                Ok(())
            }
        }
    }

    /// Redeem a one-time code; on success the account is verified and a
    /// session starts
    #[instrument(skip_all)]
    pub async fn verify_account(&self, email: &str, code: &str) -> Result<VerifyOutcome, AuthError> {
        let principal = self
            .store
            .principal_by_email(email)
            .await?
            .ok_or(AuthError::InvalidOtp)?;
        if principal.is_verified {
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        self.otps.consume(&principal.id, code).await?;
        let principal = self.mark_verified(principal.id).await?;
        info!("Verified {}", principal.id);

        let tokens = self.issuer.issue_pair(&principal).await?;
        Ok(VerifyOutcome::Verified(self.session(&principal, tokens).await?))
    }

    async fn mark_verified(&self, principal_id: PrincipalId) -> Result<Principal, AuthError> {
        for attempt in 1..=self.max_retries {
            let mut principal = self
                .store
                .principal(&principal_id)
                .await?
                .ok_or(AuthError::PrincipalNotFound(principal_id))?;
            if principal.is_verified {
                return Ok(principal);
            }
            principal.is_verified = true;
            principal.touch();

            match self
                .store
                .commit(vec![WriteOp::PutPrincipal(principal.clone())])
                .await
            {
                Ok(()) => {
                    principal.version += 1;
                    return Ok(principal);
                }
                Err(StoreError::VersionConflict(_)) => {
                    debug!(
                        "Verification of {} raced another update (attempt {}/{})",
                        principal_id, attempt, self.max_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreUnavailable(format!(
            "verification of {} kept conflicting",
            principal_id
        )))
    }

    /// The summary reflects the registry after the new refresh token landed
    async fn session(&self, principal: &Principal, tokens: TokenPair) -> Result<Session, AuthError> {
        let current = self
            .store
            .principal(&principal.id)
            .await?
            .unwrap_or_else(|| principal.clone());
        Ok(Session {
            principal: PrincipalSummary::from(&current),
            tokens,
        })
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let Some(principal) = self.store.principal_by_email(email).await? else {
            warn!("Login for unknown {}", mask_email(email));
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .passwords
            .verify(password, principal.password_hash.expose_secret())
            .await?
        {
            warn!("Wrong password for {}", principal.id);
            return Err(AuthError::InvalidCredentials);
        }
        if !principal.is_verified {
            warn!("Login of unverified {}", principal.id);
            return Err(AuthError::AccountNotVerified);
        }

        let tokens = self.issuer.issue_pair(&principal).await?;
        info!("{} logged in", principal.id);
        self.session(&principal, tokens).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let (principal, tokens) = self.issuer.rotate(refresh_token).await?;
        Ok(Session {
            principal: PrincipalSummary::from(&principal),
            tokens,
        })
    }

    /// Resolve a bearer token: signature, expiry, revocation, then the
    /// principal as it is stored now
    pub async fn authenticate(&self, access_token: &str) -> Result<CurrentPrincipal, AuthError> {
        let claims = self.issuer.verify_live_access(access_token).await?;
        let principal = self
            .store
            .principal(&claims.sub)
            .await?
            .ok_or(AuthError::LoginRequired)?;
        Ok(CurrentPrincipal {
            principal,
            claims,
            access_token: access_token.to_string(),
        })
    }

    /// End the current session. Both revocations are durable before this
    /// returns.
    #[instrument(skip_all, fields(principal = %current.principal.id))]
    pub async fn logout(
        &self,
        current: &CurrentPrincipal,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        if let Some(refresh_token) = refresh_token {
            let claims = self
                .issuer
                .signer()
                .decode(refresh_token, TokenKind::Refresh)?;
            if claims.sub != current.principal.id {
                warn!("Logout with a refresh token of another principal");
                return Err(AuthError::MalformedToken);
            }
            self.issuer
                .registry()
                .revoke_one(current.principal.id, refresh_token)
                .await?;
        }
        self.issuer
            .revoke_access(&current.claims, &current.access_token)
            .await?;
        info!("{} logged out", current.principal.id);
        Ok(())
    }

    #[instrument(skip_all, fields(principal = %current.principal.id))]
    pub async fn logout_all(&self, current: &CurrentPrincipal) -> Result<usize, AuthError> {
        let count = self
            .issuer
            .registry()
            .revoke_all(current.principal.id)
            .await?;
        self.issuer
            .revoke_access(&current.claims, &current.access_token)
            .await?;
        info!("{} logged out of {} session(s)", current.principal.id, count);
        Ok(count)
    }

    pub async fn permissions_of(&self, principal: &Principal) -> Result<PermissionDocument, AuthError> {
        self.engine
            .permission_store()
            .get_or_create(principal.id, principal.role)
            .await
    }

    #[instrument(skip(self, acting), fields(acting = %acting.id))]
    pub async fn change_role(
        &self,
        acting: &Principal,
        target_id: PrincipalId,
        new_role: Role,
    ) -> Result<RoleChange, AuthError> {
        if acting.role != Role::SuperAdmin || !acting.is_verified {
            warn!("{} ({}) tried to change a role", acting.id, acting.role);
            return Err(AuthError::Forbidden(
                "only a verified super_admin may change roles".to_string(),
            ));
        }

        let target = self
            .store
            .principal(&target_id)
            .await?
            .ok_or(AuthError::PrincipalNotFound(target_id))?;
        if target.role == new_role {
            return Ok(RoleChange::Unchanged);
        }

        let (principal, _) = self
            .engine
            .permission_store()
            .update_role(target_id, new_role)
            .await?;
        info!("Changed role of {} from {} to {}", target_id, target.role, new_role);
        Ok(RoleChange::Changed {
            principal: PrincipalSummary::from(&principal),
        })
    }

    /// Delete an account and its permission document in one batch. Deleting
    /// oneself needs `users`/`delete` on `own`, anyone else on `others`.
    #[instrument(skip(self, acting), fields(acting = %acting.id))]
    pub async fn delete_account(&self, acting: &Principal, target_id: PrincipalId) -> Result<(), AuthError> {
        let scope = Scope::derive(&acting.id, Some(&target_id));
        self.engine
            .require(acting, Resource::Users, Action::Delete, scope)
            .await?;

        match self
            .store
            .commit(vec![
                WriteOp::DeletePermissions(target_id),
                WriteOp::DeletePrincipal(target_id),
            ])
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => return Err(AuthError::PrincipalNotFound(target_id)),
            Err(e) => return Err(e.into()),
        }
        self.otps.discard(&target_id).await?;
        info!("Deleted account {}", target_id);
        Ok(())
    }
}
