//! Domain error taxonomy and its HTTP mapping.
//!
//! Lower-level store and ledger failures are logged here and surfaced as a
//! generic message; internal detail never reaches the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::oauth::LinkError;
use crate::otp::OtpError;
use crate::token::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Email already registered")]
    Conflict,
    #[error("Invalid email or password")]
    Unauthorized,
    #[error("Please verify your account first")]
    NotVerified,
    #[error("This account uses OAuth. Please login with Google or GitHub.")]
    OauthOnly,
    #[error("User not found")]
    NotFound,
    #[error("Invalid or already used OTP")]
    InvalidCode,
    #[error("OTP expired. Please request a new one.")]
    ExpiredCode,
    #[error("OAuth profile has no usable email or username")]
    ProfileIncomplete,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    TokenInvalid,
    #[error("Failed to send code. Please try again.")]
    Delivery,
    #[error("Operation failed")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidCode | Self::ExpiredCode | Self::OauthOnly => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotVerified => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ProfileIncomplete => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Delivery => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref err) = self {
            error!("internal error: {err:#}");
        }
        let body = match self {
            // Clients use this flag to route the user to the verify screen.
            Self::NotVerified => json!({
                "error": self.to_string(),
                "requires_verification": true,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<OtpError> for AuthError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::InvalidCode => Self::InvalidCode,
            OtpError::ExpiredCode => Self::ExpiredCode,
            OtpError::Internal(err) => Self::Internal(err),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid => Self::TokenInvalid,
        }
    }
}

impl From<LinkError> for AuthError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::ProfileIncomplete => Self::ProfileIncomplete,
            LinkError::Internal(err) => Self::Internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            AuthError::Validation("Email is required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::InvalidCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::ExpiredCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::ProfileIncomplete.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AuthError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Delivery.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn invalid_and_expired_codes_have_distinct_messages() {
        assert_ne!(
            AuthError::InvalidCode.to_string(),
            AuthError::ExpiredCode.to_string()
        );
    }

    #[test]
    fn expired_and_invalid_tokens_have_distinct_messages() {
        assert_ne!(
            AuthError::TokenExpired.to_string(),
            AuthError::TokenInvalid.to_string()
        );
    }

    #[test]
    fn unverified_login_is_not_conflated_with_bad_credentials() {
        assert_ne!(
            AuthError::NotVerified.status(),
            AuthError::Unauthorized.status()
        );
    }

    #[test]
    fn not_verified_response_carries_flag() {
        let response = AuthError::NotVerified.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
