//! OTP ledger records.

/// One issued code. Rows are never deleted; stale codes are invalidated by
/// flipping `consumed`.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: i64,
    pub user_id: i64,
    pub code: String,
    pub expires_at_unix: i64,
    pub consumed: bool,
}

impl OtpRecord {
    #[must_use]
    pub const fn is_expired(&self, now_unix: i64) -> bool {
        now_unix > self.expires_at_unix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_boundary_is_inclusive() {
        let record = OtpRecord {
            id: 1,
            user_id: 1,
            code: "123456".to_string(),
            expires_at_unix: 1000,
            consumed: false,
        };
        assert!(!record.is_expired(1000));
        assert!(record.is_expired(1001));
    }
}
