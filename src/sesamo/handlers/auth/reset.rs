//! Password reset: code request and completion.

use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::types::{Message, ResetPasswordRequest, SendOtpRequest};
use super::MIN_PASSWORD_LENGTH;
use crate::delivery::{ChannelKind, Delivery};
use crate::otp;
use crate::sesamo::error::AuthError;
use crate::sesamo::handlers::{normalize_email, valid_email};
use crate::store;

#[utoipa::path(
    post,
    path= "/auth/forgot-password",
    request_body = SendOtpRequest,
    responses (
        (status = 200, description = "Uniform acknowledgement", body = Message),
        (status = 400, description = "Invalid email", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, delivery, payload))]
pub async fn forgot_password(
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
        let code = otp::issue(&pool, user.id, otp::RESET_TTL).await?;
        if let Err(err) = delivery
            .send_code(
                &user,
                request.method,
                &code,
                otp::RESET_TTL.as_secs() / 60,
            )
            .await
        {
            warn!(user_id = user.id, "reset code delivery failed: {err}");
        }
    }

    Ok((
        StatusCode::OK,
        Json(Message::new(format!(
            "If an account exists, a password reset code has been sent to your {}.",
            requested.label()
        ))),
    ))
}

#[utoipa::path(
    post,
    path= "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses (
        (status = 200, description = "Password replaced", body = Message),
        (status = 400, description = "Invalid or expired code", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, payload))]
pub async fn reset_password(
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<(StatusCode, Json<Message>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload"));
    };

    if request.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(
            "Password must be at least 6 characters",
        ));
    }

    let email = normalize_email(&request.email);
    let Some(user) = store::find_by_email(&pool, email.as_str()).await? else {
        return Err(AuthError::InvalidCode);
    };

    otp::consume(&pool, user.id, request.otp.trim()).await?;
    store::set_password(&pool, user.id, &request.new_password).await?;
    info!(user_id = user.id, "password reset");

    Ok((
        StatusCode::OK,
        Json(Message::new("Password reset successfully.")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::ConsoleChannel;
    use crate::store::test_support::unreachable_pool;

    fn delivery() -> Arc<Delivery> {
        Arc::new(Delivery::new(Arc::new(ConsoleChannel::new()), None, None))
    }

    #[tokio::test]
    async fn forgot_password_rejects_malformed_email() {
        let payload = Json(SendOtpRequest {
            email: "not-an-email".to_string(),
            method: None,
        });
        let result = forgot_password(
            Extension(unreachable_pool()),
            Extension(delivery()),
            Some(payload),
        )
        .await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("A valid email is required"))
        ));
    }

    #[tokio::test]
    async fn reset_password_rejects_missing_payload() {
        let result = reset_password(Extension(unreachable_pool()), None).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("Missing payload"))
        ));
    }

    #[tokio::test]
    async fn reset_password_rejects_short_password() {
        let payload = Json(ResetPasswordRequest {
            email: "alice@example.com".to_string(),
            otp: "123456".to_string(),
            new_password: "12345".to_string(),
        });
        let result = reset_password(Extension(unreachable_pool()), Some(payload)).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation(
                "Password must be at least 6 characters"
            ))
        ));
    }
}
