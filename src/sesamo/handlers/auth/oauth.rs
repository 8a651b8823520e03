//! OAuth callback: resolve an external profile to a local account and
//! issue a session token.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};

use super::types::{Message, SessionResponse, UserInfo};
use crate::oauth::{self, ExternalProfile, Provider};
use crate::sesamo::error::AuthError;
use crate::token::{TokenIssuer, SESSION_TTL};

#[utoipa::path(
    post,
    path= "/auth/oauth/{provider}",
    params(
        ("provider" = String, Path, description = "OAuth provider, google or github")
    ),
    request_body = ExternalProfile,
    responses (
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 400, description = "Unsupported provider", body = Message),
        (status = 422, description = "Profile has no usable email or username", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, issuer, payload))]
pub async fn oauth_callback(
    Extension(pool): Extension<PgPool>,
    Extension(issuer): Extension<Arc<TokenIssuer>>,
    Path(provider): Path<String>,
    payload: Option<Json<ExternalProfile>>,
) -> Result<(StatusCode, Json<SessionResponse>), AuthError> {
    let Some(provider) = Provider::parse(&provider) else {
        return Err(AuthError::Validation("Unsupported OAuth provider"));
    };
    let Some(Json(profile)) = payload else {
        return Err(AuthError::Validation("Missing payload"));
    };

    let user = oauth::resolve(&pool, provider, &profile).await?;
    let token = issuer.issue(user.id, &user.email, user.username.as_deref(), SESSION_TTL)?;
    info!(user_id = user.id, %provider, "oauth login");

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
    async fn rejects_unknown_provider() {
        let result = oauth_callback(
            Extension(unreachable_pool()),
            Extension(issuer()),
            Path("gitlab".to_string()),
            None,
        )
        .await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("Unsupported OAuth provider"))
        ));
    }

    #[tokio::test]
    async fn rejects_missing_payload() {
        let result = oauth_callback(
            Extension(unreachable_pool()),
            Extension(issuer()),
            Path("github".to_string()),
            None,
        )
        .await;
        assert!(matches!(
            result,
            Err(AuthError::Validation("Missing payload"))
        ));
    }
}
