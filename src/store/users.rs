//! User records and credential checks.

use anyhow::{Context, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};
use tracing::Instrument;

use super::password::{hash_password, verify_password};
use crate::oauth::Provider;

/// A local user account.
///
/// An account with neither a password hash nor a provider id cannot log in;
/// no flow in this crate produces one.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub google_id: Option<String>,
    pub github_id: Option<String>,
    pub verified: bool,
}

/// Account lifecycle, derived in one place from the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Unverified,
    Verified,
}

impl AccountState {
    /// Login is refused until the account has been verified.
    #[must_use]
    pub const fn allows_login(self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl User {
    #[must_use]
    pub const fn state(&self) -> AccountState {
        if self.verified {
            AccountState::Verified
        } else {
            AccountState::Unverified
        }
    }

    /// Check a plaintext password, failing closed when the account has no
    /// password hash (OAuth-only account).
    #[must_use]
    pub fn check_password(&self, plaintext: &str) -> bool {
        match self.password_hash.as_deref() {
            Some(hash) => verify_password(plaintext, hash).unwrap_or(false),
            None => false,
        }
    }
}

/// Fields for a new account.
#[derive(Debug, Default)]
pub struct NewUser<'a> {
    pub username: Option<&'a str>,
    pub email: &'a str,
    pub password: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub provider: Option<(Provider, &'a str)>,
    pub verified: bool,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(User),
    Conflict,
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, phone, google_id, github_id, verified";

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        phone: row.get("phone"),
        google_id: row.get("google_id"),
        github_id: row.get("github_id"),
        verified: row.get("verified"),
    }
}

/// Create the tables this service owns if they do not exist yet.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let statements = [
        r"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            username TEXT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            phone TEXT,
            google_id TEXT UNIQUE,
            github_id TEXT UNIQUE,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        r"
        CREATE TABLE IF NOT EXISTS otp_codes (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            code TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            consumed BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        r"
        CREATE INDEX IF NOT EXISTS otp_codes_user_idx
        ON otp_codes (user_id, consumed, created_at DESC)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to run migration statement")?;
    }
    Ok(())
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(user_from_row))
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(user_from_row))
}

pub async fn find_by_provider_id(
    pool: &PgPool,
    provider: Provider,
    provider_id: &str,
) -> Result<Option<User>> {
    let query = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {} = $1",
        provider.id_column()
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(provider_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by provider id")?;
    Ok(row.as_ref().map(user_from_row))
}

/// Create a user, enforcing email uniqueness.
///
/// The password, when present, is hashed through the same `set_password`
/// path the reset flow uses, inside the same transaction as the insert.
pub async fn create(pool: &PgPool, fields: &NewUser<'_>) -> Result<CreateOutcome> {
    let mut tx = pool.begin().await.context("begin create transaction")?;

    let (google_id, github_id) = match fields.provider {
        Some((Provider::Google, id)) => (Some(id), None),
        Some((Provider::Github, id)) => (None, Some(id)),
        None => (None, None),
    };

    let query = format!(
        r"
        INSERT INTO users (username, email, phone, google_id, github_id, verified)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(fields.username)
        .bind(fields.email)
        .bind(fields.phone)
        .bind(google_id)
        .bind(github_id)
        .bind(fields.verified)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let mut user = match row {
        Ok(row) => user_from_row(&row),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(CreateOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    if let Some(plaintext) = fields.password {
        let hash = set_password(&mut *tx, user.id, plaintext).await?;
        user.password_hash = Some(hash);
    }

    tx.commit().await.context("commit create transaction")?;
    Ok(CreateOutcome::Created(user))
}

/// Hash and persist a new password. Plaintext is never stored or logged.
pub async fn set_password(
    executor: impl PgExecutor<'_>,
    user_id: i64,
    plaintext: &str,
) -> Result<String> {
    let hash = hash_password(plaintext).context("failed to hash password")?;
    let query = "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(&hash)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(hash)
}

pub async fn mark_verified(executor: impl PgExecutor<'_>, user_id: i64) -> Result<()> {
    let query = "UPDATE users SET verified = TRUE, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to mark user verified")?;
    Ok(())
}

pub async fn set_provider_id(
    pool: &PgPool,
    user_id: i64,
    provider: Provider,
    provider_id: &str,
) -> Result<()> {
    let query = format!(
        "UPDATE users SET {} = $2, updated_at = NOW() WHERE id = $1",
        provider.id_column()
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    sqlx::query(&query)
        .bind(user_id)
        .bind(provider_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to set provider id")?;
    Ok(())
}

pub async fn update_email(pool: &PgPool, user_id: i64, email: &str) -> Result<()> {
    let query = "UPDATE users SET email = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update email")?;
    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::password::hash_password;

    fn user(password_hash: Option<String>, verified: bool) -> User {
        User {
            id: 1,
            username: Some("alice".to_string()),
            email: "alice@example.com".to_string(),
            password_hash,
            phone: None,
            google_id: None,
            github_id: None,
            verified,
        }
    }

    #[test]
    fn check_password_accepts_matching() {
        let hash = hash_password("secret1").unwrap();
        assert!(user(Some(hash), true).check_password("secret1"));
    }

    #[test]
    fn check_password_rejects_wrong() {
        let hash = hash_password("secret1").unwrap();
        assert!(!user(Some(hash), true).check_password("secret2"));
    }

    #[test]
    fn check_password_fails_closed_without_hash() {
        // OAuth-only accounts never authenticate by password.
        assert!(!user(None, true).check_password("anything"));
    }

    #[test]
    fn state_derives_from_verified_flag() {
        assert_eq!(user(None, false).state(), AccountState::Unverified);
        assert_eq!(user(None, true).state(), AccountState::Verified);
    }

    #[test]
    fn only_verified_accounts_may_login() {
        assert!(!AccountState::Unverified.allows_login());
        assert!(AccountState::Verified.allows_login());
    }
}
