//! Password, OTP and OAuth login endpoints.

pub mod login;
pub mod oauth;
pub mod otp_login;
pub mod register;
pub mod reset;
pub mod types;
pub mod verification;

pub use self::login::login;
pub use self::oauth::oauth_callback;
pub use self::otp_login::{send_otp, verify_otp};
pub use self::register::register;
pub use self::reset::{forgot_password, reset_password};
pub use self::verification::{send_verification, verify_account};

pub const MIN_PASSWORD_LENGTH: usize = 6;
