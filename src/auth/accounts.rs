//! Account repository: the narrow storage interface the session issuer
//! uses for `users` rows. All mutating helpers run inside a caller-owned
//! transaction so token issuance commits atomically with account updates.

use std::ops::DerefMut;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::auth::{AuthError, AuthResult};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub email_verified: bool,
    pub failed_signin_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
}

/// Fetches an account by (already normalized) email, locking the row so
/// concurrent sign-in attempts serialize their lockout bookkeeping.
pub async fn find_by_email_for_update(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
) -> AuthResult<Option<Account>> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, email, username, password_hash, email_verified,
               failed_signin_attempts, lock_until
        FROM users
        WHERE email = $1
        FOR UPDATE
        "#,
    )
    .bind(email)
    .fetch_optional(tx.deref_mut())
    .await?;

    Ok(account)
}

/// Inserts a new account, mapping the email uniqueness conflict to
/// [`AuthError::EmailExists`].
pub async fn insert_account(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    username: Option<&str>,
    password_hash: &str,
) -> AuthResult<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (email, username, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .fetch_one(tx.deref_mut())
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AuthError::EmailExists
        } else {
            AuthError::from(err)
        }
    })?;

    Ok(id)
}

pub async fn record_failed_attempt(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    attempts: i32,
    lock_until: Option<DateTime<Utc>>,
) -> AuthResult<()> {
    sqlx::query(
        "UPDATE users SET failed_signin_attempts = $1, lock_until = $2, updated_at = now() \
         WHERE id = $3",
    )
    .bind(attempts)
    .bind(lock_until)
    .bind(account_id)
    .execute(tx.deref_mut())
    .await?;

    Ok(())
}

pub async fn reset_failed_attempts(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> AuthResult<()> {
    sqlx::query(
        "UPDATE users SET failed_signin_attempts = 0, lock_until = NULL, updated_at = now() \
         WHERE id = $1",
    )
    .bind(account_id)
    .execute(tx.deref_mut())
    .await?;

    Ok(())
}

/// Creates or links an account for a verified external identity. A fresh
/// row starts with `email_verified = true` and the supplied placeholder
/// hash; an existing row only has its verified flag raised.
pub async fn upsert_external_account(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    username: &str,
    placeholder_hash: &str,
) -> AuthResult<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO users (email, username, password_hash, email_verified)
        VALUES ($1, $2, $3, TRUE)
        ON CONFLICT (email) DO UPDATE
            SET email_verified = TRUE,
                updated_at = now()
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(username)
    .bind(placeholder_hash)
    .fetch_one(tx.deref_mut())
    .await?;

    Ok(id)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.code().map(|code| code == "23505").unwrap_or(false)
    )
}
