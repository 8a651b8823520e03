pub mod auth;
pub mod health;
pub mod sso;

pub use self::health::health;

// common functions for the handlers
use regex::Regex;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// Emails are compared and stored lowercased so lookups are
/// case-insensitive without a functional index.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_common_addresses() {
        assert!(valid_email("alice@example.com"));
        assert!(valid_email("a.b+c@sub.example.co"));
    }

    #[test]
    fn valid_email_rejects_malformed_addresses() {
        assert!(!valid_email("alice"));
        assert!(!valid_email("alice@example"));
        assert!(!valid_email("alice @example.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
