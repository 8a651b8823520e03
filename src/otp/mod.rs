//! OTP ledger: short-lived numeric codes, one live code per user.

pub mod models;
mod repo;
pub mod service;

pub use models::OtpRecord;
pub use service::{
    check_code, consume, generate_code, issue, OtpError, CODE_LENGTH, RESET_TTL, VERIFY_TTL,
};
