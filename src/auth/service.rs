//! Session issuer: orchestrates credential checks, lockout bookkeeping,
//! token minting and refresh-record persistence into the five user-facing
//! operations. All store writes for one operation share a transaction that
//! commits before any token leaves this module, so a caller never holds a
//! token pair whose refresh record is not durable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::identity::IdentityVerifier;
use crate::auth::{
    AuthConfig, AuthError, AuthResult, JwtService, PasswordService, RefreshTokenStore, accounts,
    lockout, validate,
};

/// Result of a successful sign-up, sign-in, refresh or external sign-in.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub account_id: Uuid,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionService {
    config: AuthConfig,
    pool: PgPool,
    passwords: Arc<PasswordService>,
    jwt: Arc<JwtService>,
    refresh_tokens: RefreshTokenStore,
    identity: IdentityVerifier,
}

impl SessionService {
    pub fn new(
        config: AuthConfig,
        pool: PgPool,
        passwords: Arc<PasswordService>,
        jwt: Arc<JwtService>,
        refresh_tokens: RefreshTokenStore,
        identity: IdentityVerifier,
    ) -> Self {
        Self {
            config,
            pool,
            passwords,
            jwt,
            refresh_tokens,
            identity,
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> AuthResult<SessionTokens> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidPayload);
        }
        if !validate::valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if !validate::strong_password(password) {
            return Err(AuthError::WeakPassword);
        }

        // Hash failure aborts account creation; never fall back to a weaker
        // digest or an empty hash.
        let password_hash = self.passwords.hash_password(password)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let account_id = accounts::insert_account(&mut tx, &email, username, &password_hash).await?;
        let tokens = self.issue_pair_tx(&mut tx, account_id, now).await?;
        tx.commit().await?;

        log::info!("account created: {account_id}");
        Ok(tokens)
    }

    /// Check order is lock-check, then password check with lockout
    /// bookkeeping, then the verified-email gate. Unknown email and wrong
    /// password share one error code, and a locked account answers without
    /// consulting the password at all.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<SessionTokens> {
        let email = email.trim().to_lowercase();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidPayload);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let account = accounts::find_by_email_for_update(&mut tx, &email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if let Some(minutes) = lockout::remaining_minutes(account.lock_until, now) {
            return Err(AuthError::AccountLocked { minutes });
        }

        // An internal verification error counts as a mismatch (fail closed).
        let verified = self
            .passwords
            .verify_password(password, &account.password_hash)
            .unwrap_or(false);

        if !verified {
            let (attempts, lock_until) = lockout::after_failure(account.failed_signin_attempts, now);
            accounts::record_failed_attempt(&mut tx, account.id, attempts, lock_until).await?;
            tx.commit().await?;
            if lock_until.is_some() {
                log::warn!("account locked after repeated failures: {}", account.id);
            }
            return Err(AuthError::InvalidCredentials);
        }

        accounts::reset_failed_attempts(&mut tx, account.id).await?;

        if !account.email_verified {
            tx.commit().await?;
            return Err(AuthError::EmailNotVerified);
        }

        let tokens = self.issue_pair_tx(&mut tx, account.id, now).await?;
        tx.commit().await?;
        Ok(tokens)
    }

    /// Redeems a refresh token and replaces it with a brand-new pair bound
    /// to the same subject. The consumed token is gone the moment this
    /// commits, whether or not it is ever presented again.
    pub async fn refresh(&self, raw_token: &str) -> AuthResult<SessionTokens> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AuthError::InvalidPayload);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let account_id = self.refresh_tokens.redeem_tx(&mut tx, raw_token, now).await?;
        let tokens = self.issue_pair_tx(&mut tx, account_id, now).await?;
        tx.commit().await?;
        Ok(tokens)
    }

    /// Revokes a refresh token. Succeeds whether or not the token still
    /// exists, so repeated logouts are harmless.
    pub async fn logout(&self, raw_token: &str) -> AuthResult<()> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AuthError::InvalidPayload);
        }

        self.refresh_tokens.revoke(raw_token).await
    }

    /// Signs in (or signs up) via a third-party identity assertion. The
    /// verifier's errors pass through unchanged, and nothing is written
    /// unless the assertion validated: in particular an audience mismatch
    /// leaves the account table untouched.
    pub async fn external_sign_in(&self, assertion: &str) -> AuthResult<SessionTokens> {
        let assertion = assertion.trim();
        if assertion.is_empty() {
            return Err(AuthError::InvalidPayload);
        }

        let identity = self.identity.verify(assertion).await?;

        // A fresh external account gets a random unusable digest so password
        // sign-in can never succeed against it. Hashing happens before the
        // transaction opens; argon2 is deliberately slow.
        let placeholder_hash = self.passwords.hash_unusable()?;
        let username = identity.email.split('@').next().unwrap_or_default().to_string();

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let account_id = accounts::upsert_external_account(
            &mut tx,
            &identity.email,
            &username,
            &placeholder_hash,
        )
        .await?;
        let tokens = self.issue_pair_tx(&mut tx, account_id, now).await?;
        tx.commit().await?;

        log::info!("external sign-in for account {account_id}");
        Ok(tokens)
    }

    /// The underlying refresh-token store, exposed for background cleanup.
    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    async fn issue_pair_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionTokens> {
        let access = self
            .jwt
            .issue(&account_id.to_string(), self.config.access_token_ttl())?;
        let refresh = self
            .refresh_tokens
            .create_tx(tx, account_id, now, self.config.refresh_token_ttl())
            .await?;

        Ok(SessionTokens {
            account_id,
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }
}
