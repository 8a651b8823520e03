use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::types::{Message, RegisterRequest, RegisterResponse};
use super::MIN_PASSWORD_LENGTH;
use crate::delivery::Delivery;
use crate::otp;
use crate::sesamo::error::AuthError;
use crate::sesamo::handlers::{normalize_email, valid_email};
use crate::store::{self, CreateOutcome, NewUser};

#[utoipa::path(
    post,
    path= "/auth/register",
    request_body = RegisterRequest,
    responses (
        (status = 201, description = "Account created, verification code sent", body = RegisterResponse),
        (status = 400, description = "Invalid email or password", body = Message),
        (status = 409, description = "Email already registered", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, delivery, payload))]
pub async fn register(
    Extension(pool): Extension<PgPool>,
    Extension(delivery): Extension<Arc<Delivery>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("A valid email is required"));
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(
            "Password must be at least 6 characters",
        ));
    }

    let fields = NewUser {
        username: request.username.as_deref(),
        email: &email,
        password: Some(&request.password),
        phone: request.phone.as_deref(),
        provider: None,
        verified: false,
    };

    let user = match store::create(&pool, &fields).await? {
        CreateOutcome::Created(user) => user,
        CreateOutcome::Conflict => return Err(AuthError::Conflict),
    };

    info!(user_id = user.id, "user registered");

    // The account exists either way; a failed send is retried through
    // /auth/send-verification.
    let code = otp::issue(&pool, user.id, otp::VERIFY_TTL).await?;
    if let Err(err) = delivery
        .send_code(&user, None, &code, otp::VERIFY_TTL.as_secs() / 60)
        .await
    {
        warn!(user_id = user.id, "verification code delivery failed: {err}");
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please check your email for a verification code."
                .to_string(),
            requires_verification: true,
        }),
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

    fn request(email: &str, password: &str) -> Json<RegisterRequest> {
        Json(RegisterRequest {
            username: None,
            email: email.to_string(),
            password: password.to_string(),
            phone: None,
        })
    }

    #[tokio::test]
    async fn rejects_missing_payload() {
        let result = register(Extension(unreachable_pool()), Extension(delivery()), None).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("Missing payload"))
        ));
    }

    #[tokio::test]
    async fn rejects_malformed_email() {
        let result = register(
            Extension(unreachable_pool()),
            Extension(delivery()),
            Some(request("not-an-email", "secret1")),
        )
        .await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("A valid email is required"))
        ));
    }

    #[tokio::test]
    async fn rejects_short_password() {
        let result = register(
            Extension(unreachable_pool()),
            Extension(delivery()),
            Some(request("alice@example.com", "12345")),
        )
        .await;
        assert!(matches!(
            result,
            Err(AuthError::Validation(
                "Password must be at least 6 characters"
            ))
        ));
    }
}
