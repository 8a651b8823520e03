pub mod cli;
pub mod delivery;
pub mod oauth;
pub mod otp;
pub mod sesamo;
pub mod sso;
pub mod store;
pub mod token;
