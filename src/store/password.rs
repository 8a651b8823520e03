//! Password hashing.
//!
//! Hashing happens here and nowhere else; both registration and reset go
//! through [`super::users::set_password`], which calls into this module.

use std::sync::OnceLock;

/// bcrypt cost factor
const BCRYPT_COST: u32 = 10;

/// Hash a plaintext password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Verify a plaintext password against a stored bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| hash_password("throwaway-padding").unwrap_or_default())
}

/// Burn one bcrypt check against a fixed hash. Login paths that found no
/// account call this so unknown emails cost the same as wrong passwords.
pub fn dummy_verify(password: &str) {
    let _ = verify_password(password, dummy_hash());
}
