//! Database access for the OTP ledger.
//!
//! Callers run these inside one transaction so that invalidate-then-insert
//! and check-then-mark stay atomic against concurrent requests for the same
//! user.

use anyhow::{Context, Result};
use sqlx::{Postgres, Row, Transaction};
use tracing::Instrument;

use super::models::OtpRecord;

/// Mark every unconsumed code for the user as consumed.
///
/// Runs before a new code is inserted so at most one live code exists per
/// user and an older leaked code cannot outlive a newer one.
pub(super) async fn invalidate_all(tx: &mut Transaction<'_, Postgres>, user_id: i64) -> Result<()> {
    let query = "UPDATE otp_codes SET consumed = TRUE WHERE user_id = $1 AND consumed = FALSE";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to invalidate prior otp codes")?;
    Ok(())
}

pub(super) async fn insert_code(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    code: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO otp_codes (user_id, code, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(code)
        .bind(ttl_seconds)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert otp code")?;
    Ok(())
}

/// Fetch the newest unconsumed record matching the submitted code, locking
/// the row so a concurrent consumer of the same code blocks until this
/// transaction decides.
pub(super) async fn lock_newest_matching(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    code: &str,
) -> Result<Option<OtpRecord>> {
    let query = r"
        SELECT id, user_id, code,
               EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix,
               consumed
        FROM otp_codes
        WHERE user_id = $1 AND code = $2 AND consumed = FALSE
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(code)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to lookup otp code")?;

    Ok(row.map(|row| OtpRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        code: row.get("code"),
        expires_at_unix: row.get("expires_at_unix"),
        consumed: row.get("consumed"),
    }))
}

pub(super) async fn mark_consumed(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<()> {
    let query = "UPDATE otp_codes SET consumed = TRUE WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to mark otp code consumed")?;
    Ok(())
}
