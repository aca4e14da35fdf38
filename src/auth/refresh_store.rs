use std::ops::DerefMut;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::{AuthConfig, AuthError, AuthResult};

const TOKEN_LEN: usize = 32;

/// Freshly minted refresh token. The raw value goes to the caller exactly
/// once and is never persisted or logged; only its fingerprint reaches the
/// database.
#[derive(Debug, Clone)]
pub struct RefreshTokenIssued {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Durable refresh-token records keyed by fingerprint.
///
/// The fingerprint is an HMAC-SHA256 of the raw token under the
/// refresh-secret class, so a database dump discloses no redeemable values
/// and the refresh secret stays distinct from the access-token signing key.
#[derive(Debug, Clone)]
pub struct RefreshTokenStore {
    pool: PgPool,
    fingerprint_key: String,
}

impl RefreshTokenStore {
    pub fn new(pool: PgPool, config: &AuthConfig) -> Self {
        Self {
            pool,
            fingerprint_key: config.refresh_token_secret.clone(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Persists a record for a brand-new random token and returns the raw
    /// value. Runs inside the caller's transaction so the record is only
    /// durable once the surrounding operation commits.
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AuthResult<RefreshTokenIssued> {
        let token = generate_token();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(self.fingerprint(&token))
        .bind(account_id)
        .bind(expires_at)
        .execute(tx.deref_mut())
        .await?;

        Ok(RefreshTokenIssued { token, expires_at })
    }

    /// Atomically consumes an unexpired record and returns its owner.
    ///
    /// The lookup and delete are one statement, so of any number of
    /// concurrent redeem attempts on the same raw token exactly one
    /// observes the row; the rest fail with [`AuthError::InvalidOrExpired`].
    /// An expired record is treated as absent even if physically present.
    pub async fn redeem_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Uuid> {
        let account_id = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM refresh_tokens WHERE token_hash = $1 AND expires_at > $2 \
             RETURNING user_id",
        )
        .bind(self.fingerprint(raw_token))
        .bind(now)
        .fetch_optional(tx.deref_mut())
        .await?;

        account_id.ok_or(AuthError::InvalidOrExpired)
    }

    /// Deletes the record if present. Idempotent: revoking an absent or
    /// already-consumed token is not an error.
    pub async fn revoke(&self, raw_token: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(self.fingerprint(raw_token))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Lazy cleanup of dead rows. Correctness never depends on this;
    /// `redeem_tx` filters on expiry itself.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    fn fingerprint(&self, raw_token: &str) -> String {
        fingerprint_with_key(&self.fingerprint_key, raw_token)
    }
}

fn fingerprint_with_key(key: &str, raw_token: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(raw_token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_are_deterministic_per_secret() {
        let a = fingerprint_with_key("refresh-secret-a", "token");
        assert_eq!(a, fingerprint_with_key("refresh-secret-a", "token"));
        assert_ne!(a, fingerprint_with_key("refresh-secret-a", "token2"));
        assert_ne!(a, fingerprint_with_key("refresh-secret-b", "token"));
    }

    #[test]
    fn raw_tokens_are_random_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.len() >= 43); // 32 bytes, base64url without padding
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
