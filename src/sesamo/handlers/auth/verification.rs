//! Account verification: code re-send and confirmation.
//!
//! The send endpoint answers identically whether or not the email maps to
//! an account, so it cannot be used to enumerate users.

use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::types::{CodeRequest, Message, SendOtpRequest, SessionResponse, UserInfo};
use crate::delivery::{ChannelKind, Delivery};
use crate::otp;
use crate::sesamo::error::AuthError;
use crate::sesamo::handlers::{normalize_email, valid_email};
use crate::store;
use crate::token::{TokenIssuer, SESSION_TTL};

#[utoipa::path(
    post,
    path= "/auth/send-verification",
    request_body = SendOtpRequest,
    responses (
        (status = 200, description = "Uniform acknowledgement", body = Message),
        (status = 400, description = "Invalid email", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, delivery, payload))]
pub async fn send_verification(
    Extension(pool): Extension<PgPool>,
    Extension(delivery): Extension<Arc<Delivery>>,
    payload: Option<Json<SendOtpRequest>>,
) -> Result<(StatusCode, Json<Message>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("A valid email is required"));
    }

    let requested = request.method.unwrap_or(ChannelKind::Email);

    if let Some(user) = store::find_by_email(&pool, email.as_str()).await? {
        if !user.verified {
            let code = otp::issue(&pool, user.id, otp::VERIFY_TTL).await?;
            if let Err(err) = delivery
                .send_code(
                    &user,
                    request.method,
                    &code,
                    otp::VERIFY_TTL.as_secs() / 60,
                )
                .await
            {
                warn!(user_id = user.id, "verification code delivery failed: {err}");
            }
        }
    }

    Ok((
        StatusCode::OK,
        Json(Message::new(format!(
            "If an account exists, a verification code has been sent to your {}.",
            requested.label()
        ))),
    ))
}

#[utoipa::path(
    post,
    path= "/auth/verify-account",
    request_body = CodeRequest,
    responses (
        (status = 200, description = "Account verified, session issued", body = SessionResponse),
        (status = 400, description = "Invalid or expired code", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, issuer, payload))]
pub async fn verify_account(
    Extension(pool): Extension<PgPool>,
    Extension(issuer): Extension<Arc<TokenIssuer>>,
    payload: Option<Json<CodeRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    // Unknown emails read the same as a wrong code.
    let Some(user) = store::find_by_email(&pool, email.as_str()).await? else {
        return Err(AuthError::InvalidCode);
    };

    otp::consume(&pool, user.id, request.otp.trim()).await?;
    store::mark_verified(&pool, user.id).await?;
    info!(user_id = user.id, "account verified");

    let token = issuer.issue(user.id, &user.email, user.username.as_deref(), SESSION_TTL)?;

    Ok((
        StatusCode::OK,
        Json(SessionResponse {
            token,
            user: UserInfo::from(&user),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::ConsoleChannel;
    use crate::store::test_support::unreachable_pool;
    use secrecy::SecretString;

    #[tokio::test]
    async fn send_verification_rejects_malformed_email() {
        let delivery = Arc::new(Delivery::new(Arc::new(ConsoleChannel::new()), None, None));
        let payload = Json(SendOtpRequest {
            email: "alice@nodot".to_string(),
            method: None,
        });
        let result = send_verification(
            Extension(unreachable_pool()),
            Extension(delivery),
            Some(payload),
        )
        .await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("A valid email is required"))
        ));
    }

    #[tokio::test]
    async fn verify_account_rejects_missing_payload() {
        let issuer = Arc::new(TokenIssuer::new(&SecretString::from(
            "test-secret".to_string(),
        )));
        let result = verify_account(Extension(unreachable_pool()), Extension(issuer), None).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("Missing payload"))
        ));
    }
}
