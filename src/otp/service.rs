//! OTP issuance and consumption.

use anyhow::Context;
use rand::{rngs::OsRng, Rng};
use sqlx::PgPool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::models::OtpRecord;
use super::repo;

/// TTL for account-verification codes.
pub const VERIFY_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL for password-reset codes.
pub const RESET_TTL: Duration = Duration::from_secs(10 * 60);

pub const CODE_LENGTH: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("invalid or already used code")]
    InvalidCode,
    #[error("code expired")]
    ExpiredCode,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Generate a uniformly-random fixed-width numeric code.
#[must_use]
pub fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

/// Decide whether a submitted code matches a ledger record.
///
/// Invalid (wrong or already consumed) and expired are distinct outcomes so
/// callers can answer differently.
pub fn check_code(record: &OtpRecord, submitted: &str, now_unix: i64) -> Result<(), OtpError> {
    if record.consumed || record.code != submitted {
        return Err(OtpError::InvalidCode);
    }
    if record.is_expired(now_unix) {
        return Err(OtpError::ExpiredCode);
    }
    Ok(())
}

/// Issue a fresh code for the user, invalidating every prior unconsumed one
/// in the same transaction. Returns the code for out-of-band delivery; it is
/// never logged.
pub async fn issue(pool: &PgPool, user_id: i64, ttl: Duration) -> Result<String, OtpError> {
    let code = generate_code();
    let mut tx = pool.begin().await.context("begin otp issue transaction")?;
    repo::invalidate_all(&mut tx, user_id).await?;
    repo::insert_code(&mut tx, user_id, &code, ttl.as_secs() as i64).await?;
    tx.commit().await.context("commit otp issue transaction")?;
    Ok(code)
}

/// Consume a code: match the newest unconsumed record, check expiry, and
/// mark it consumed before returning. The row lock taken inside the
/// transaction makes a second concurrent consumer fail with `InvalidCode`.
pub async fn consume(pool: &PgPool, user_id: i64, code: &str) -> Result<(), OtpError> {
    let mut tx = pool
        .begin()
        .await
        .context("begin otp consume transaction")?;

    let Some(record) = repo::lock_newest_matching(&mut tx, user_id, code).await? else {
        let _ = tx.rollback().await;
        return Err(OtpError::InvalidCode);
    };

    if let Err(err) = check_code(&record, code, now_unix()) {
        // Expired codes stay unconsumed; reissuing will invalidate them.
        let _ = tx.rollback().await;
        return Err(err);
    }

    repo::mark_consumed(&mut tx, record.id).await?;
    tx.commit().await.context("commit otp consume transaction")?;
    Ok(())
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, expires_at_unix: i64, consumed: bool) -> OtpRecord {
        OtpRecord {
            id: 1,
            user_id: 42,
            code: code.to_string(),
            expires_at_unix,
            consumed,
        }
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn check_code_accepts_live_match() {
        let record = record("123456", 2000, false);
        assert!(check_code(&record, "123456", 1000).is_ok());
    }

    #[test]
    fn check_code_rejects_wrong_code() {
        let record = record("123456", 2000, false);
        assert!(matches!(
            check_code(&record, "654321", 1000),
            Err(OtpError::InvalidCode)
        ));
    }

    #[test]
    fn check_code_rejects_consumed_as_invalid_not_expired() {
        // A replayed code must read as invalid even while inside its TTL.
        let record = record("123456", 2000, true);
        assert!(matches!(
            check_code(&record, "123456", 1000),
            Err(OtpError::InvalidCode)
        ));
    }

    #[test]
    fn check_code_rejects_expired_distinctly() {
        let record = record("123456", 1000, false);
        assert!(matches!(
            check_code(&record, "123456", 1001),
            Err(OtpError::ExpiredCode)
        ));
    }

    #[test]
    fn ttl_presets() {
        assert_eq!(VERIFY_TTL.as_secs(), 5 * 60);
        assert_eq!(RESET_TTL.as_secs(), 10 * 60);
    }
}
