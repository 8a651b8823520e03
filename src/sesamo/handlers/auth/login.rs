use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};

use super::types::{LoginRequest, Message, SessionResponse, UserInfo};
use crate::sesamo::error::AuthError;
use crate::sesamo::handlers::normalize_email;
use crate::store::{self, password};
use crate::token::{TokenIssuer, SESSION_TTL};

#[utoipa::path(
    post,
    path= "/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 401, description = "Invalid email or password", body = Message),
        (status = 403, description = "Account not verified", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, issuer, payload))]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(issuer): Extension<Arc<TokenIssuer>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    let Some(user) = store::find_by_email(&pool, email.as_str()).await? else {
        // Unknown emails pay for a hash check too; the response time must
        // not reveal whether the account exists.
        password::dummy_verify(&request.password);
        return Err(AuthError::Unauthorized);
    };

    // Linked accounts without a password get a pointer to the right door
    // instead of a generic credential failure.
    if user.password_hash.is_none() && (user.google_id.is_some() || user.github_id.is_some()) {
        return Err(AuthError::OauthOnly);
    }
    if !user.check_password(&request.password) {
        return Err(AuthError::Unauthorized);
    }
    if !user.state().allows_login() {
        return Err(AuthError::NotVerified);
    }

    let token = issuer.issue(user.id, &user.email, user.username.as_deref(), SESSION_TTL)?;
    info!(user_id = user.id, "password login");

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
    use crate::store::test_support::unreachable_pool;
    use secrecy::SecretString;

    fn issuer() -> Arc<TokenIssuer> {
        Arc::new(TokenIssuer::new(&SecretString::from(
            "test-secret".to_string(),
        )))
    }

    #[tokio::test]
    async fn rejects_missing_payload() {
        let result = login(Extension(unreachable_pool()), Extension(issuer()), None).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("Missing payload"))
        ));
    }

    #[tokio::test]
    async fn surfaces_internal_error_when_database_is_unreachable() {
        let payload = Json(LoginRequest {
            email: "alice@example.com".to_string(),
            password: "secret1".to_string(),
        });
        let result = login(
            Extension(unreachable_pool()),
            Extension(issuer()),
            Some(payload),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
