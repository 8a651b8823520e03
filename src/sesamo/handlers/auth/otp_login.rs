//! Passwordless OTP login.
//!
//! The send endpoint names the channel the caller asked for, never the one
//! actually used, so the response stays constant for unknown emails and
//! after a whatsapp-to-email fallback alike.

use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::types::{CodeRequest, Message, SendOtpRequest, TokenPairResponse, UserInfo};
use crate::delivery::{ChannelKind, Delivery};
use crate::otp;
use crate::sesamo::error::AuthError;
use crate::sesamo::handlers::{normalize_email, valid_email};
use crate::store;
use crate::token::{TokenIssuer, ACCESS_TTL, REFRESH_TTL};

#[utoipa::path(
    post,
    path= "/auth/send-otp",
    request_body = SendOtpRequest,
    responses (
        (status = 200, description = "Uniform acknowledgement", body = Message),
        (status = 400, description = "Invalid email", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, delivery, payload))]
pub async fn send_otp(
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
            warn!(user_id = user.id, "login code delivery failed: {err}");
        }
    }

    Ok((
        StatusCode::OK,
        Json(Message::new(format!(
            "If an account exists, a code has been sent to your {}.",
            requested.label()
        ))),
    ))
}

#[utoipa::path(
    post,
    path= "/auth/verify-otp",
    request_body = CodeRequest,
    responses (
        (status = 200, description = "Login successful", body = TokenPairResponse),
        (status = 400, description = "Invalid or expired code", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, issuer, payload))]
pub async fn verify_otp(
    Extension(pool): Extension<PgPool>,
    Extension(issuer): Extension<Arc<TokenIssuer>>,
    payload: Option<Json<CodeRequest>>,
) -> Result<(StatusCode, Json<TokenPairResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    let Some(user) = store::find_by_email(&pool, email.as_str()).await? else {
        return Err(AuthError::InvalidCode);
    };

    otp::consume(&pool, user.id, request.otp.trim()).await?;

    // Consuming a code proves control of the mailbox.
    if !user.verified {
        store::mark_verified(&pool, user.id).await?;
    }

    let access_token = issuer.issue(user.id, &user.email, user.username.as_deref(), ACCESS_TTL)?;
    let refresh_token =
        issuer.issue(user.id, &user.email, user.username.as_deref(), REFRESH_TTL)?;
    info!(user_id = user.id, "otp login");

    Ok((
        StatusCode::OK,
        Json(TokenPairResponse {
            access_token,
            refresh_token,
            user: UserInfo::from(&user),
        }),
    ))
}
