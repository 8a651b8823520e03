//! Signed bearer tokens carrying identity claims.
//!
//! One claim shape for every login flow: user id, email, optional display
//! name. The TTL is always a per-call parameter; the presets below are the
//! only values used in practice.

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Short-lived token for the passwordless OTP login flow.
pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Long-lived refresh token paired with [`ACCESS_TTL`].
pub const REFRESH_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Token issued by password, OAuth and SSO logins.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Identity facts embedded in a signed token.
///
/// No password material and no long-lived secret ever go in here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

/// Signs and verifies bearer tokens with a symmetric secret.
///
/// The secret is read once at startup; a missing secret refuses process
/// start, it never becomes a per-request error.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a token for the given identity, valid for `ttl` from now.
    pub fn issue(
        &self,
        user_id: i64,
        email: &str,
        name: Option<&str>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let iat = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            name: name.map(str::to_string),
            iat,
            exp: iat + ttl.as_secs(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| TokenError::Invalid)
    }

    /// Decode and verify a token, distinguishing expiry from any other
    /// signature or structure problem so callers can answer differently.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&SecretString::from("test-secret".to_string()))
    }

    #[test]
    fn round_trip_returns_claims() {
        let issuer = issuer();
        let token = issuer
            .issue(42, "alice@example.com", Some("alice"), SESSION_TTL)
            .unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.name.as_deref(), Some("alice"));
        assert_eq!(claims.exp - claims.iat, SESSION_TTL.as_secs());
    }

    #[test]
    fn name_is_optional() {
        let issuer = issuer();
        let token = issuer.issue(7, "bob@example.com", None, ACCESS_TTL).unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.name, None);
    }

    #[test]
    fn expired_token_reports_expired() {
        let issuer = issuer();
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: 1,
            email: "alice@example.com".to_string(),
            name: None,
            iat: now - 120,
            exp: now - 60,
        };
        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_token_reports_invalid() {
        let issuer = issuer();
        assert_eq!(issuer.verify("not-a-token"), Err(TokenError::Invalid));
    }

    #[test]
    fn wrong_secret_reports_invalid() {
        let issuer = issuer();
        let other = TokenIssuer::new(&SecretString::from("other-secret".to_string()));
        let token = issuer.issue(1, "a@example.com", None, SESSION_TTL).unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn ttl_presets_hold_expected_values() {
        assert_eq!(ACCESS_TTL.as_secs(), 15 * 60);
        assert_eq!(REFRESH_TTL.as_secs(), 30 * 24 * 60 * 60);
        assert_eq!(SESSION_TTL.as_secs(), 60 * 60);
    }
}
