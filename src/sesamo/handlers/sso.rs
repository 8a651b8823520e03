//! Single-sign-on endpoints: cookie-backed login, token verification,
//! logout.
//!
//! The session cookie is HTTP-only and never readable by page scripts; the
//! signed token only ever travels in the redirect query and the
//! Authorization header.

use axum::{
    extract::rejection::QueryRejection,
    extract::{Extension, Query},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::sesamo::error::AuthError;
use crate::sesamo::Settings;
use crate::sso::{SsoBroker, SESSION_TTL};

pub const SSO_COOKIE: &str = "sso_session";

#[derive(IntoParams, Debug, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct RedirectParams {
    /// Where to send the browser after a successful login.
    pub redirect: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SsoLoginRequest {
    pub email: String,
    pub password: String,
    pub redirect: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SsoIdentity {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SsoVerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SsoIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path= "/sso/login",
    params(RedirectParams),
    responses (
        (status = 303, description = "Live session, redirecting with a fresh token"),
        (status = 400, description = "Missing or invalid redirect URL"),
        (status = 401, description = "No live session; interactive login required"),
    ),
    tag= "sso"
)]
#[instrument(skip(broker, headers, query))]
pub async fn sso_auto_login(
    Extension(broker): Extension<Arc<SsoBroker>>,
    headers: HeaderMap,
    query: Result<Query<RedirectParams>, QueryRejection>,
) -> Response {
    let Ok(Query(params)) = query else {
        return AuthError::Validation("Missing redirect URL").into_response();
    };

    let Some(session_id) = cookie_value(&headers, SSO_COOKIE) else {
        return authentication_required();
    };

    match broker.auto_login(&session_id, &params.redirect).await {
        Ok(login) => Redirect::to(&login.redirect_to).into_response(),
        Err(AuthError::Unauthorized) => authentication_required(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/sso/login",
    request_body = SsoLoginRequest,
    responses (
        (status = 303, description = "Login successful, session cookie set, redirecting with a token"),
        (status = 400, description = "Missing payload or invalid redirect URL"),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account not verified"),
    ),
    tag= "sso"
)]
#[instrument(skip(broker, settings, payload))]
pub async fn sso_login(
    Extension(broker): Extension<Arc<SsoBroker>>,
    Extension(settings): Extension<Arc<Settings>>,
    payload: Option<Json<SsoLoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::Validation("Missing payload").into_response();
    };

    let login = match broker
        .login(&request.email, &request.password, &request.redirect)
        .await
    {
        Ok(login) => login,
        Err(err) => return err.into_response(),
    };

    // Redirect::to replies 303, the right verb change for a POST login.
    let mut response = Redirect::to(&login.redirect_to).into_response();
    let cookie = session_cookie(&login.session_id, settings.cookie_secure);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

#[utoipa::path(
    get,
    path= "/sso/verify",
    responses (
        (status = 200, description = "Token is valid", body = SsoVerifyResponse),
        (status = 401, description = "Token missing, expired or invalid", body = SsoVerifyResponse),
    ),
    tag= "sso"
)]
#[instrument(skip(broker, headers))]
pub async fn sso_verify(
    Extension(broker): Extension<Arc<SsoBroker>>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return verify_failure("Missing bearer token");
    };

    match broker.verify(token).await {
        Ok(claims) => Json(SsoVerifyResponse {
            valid: true,
            user: Some(SsoIdentity {
                id: claims.sub,
                email: claims.email,
                name: claims.name,
            }),
            error: None,
        })
        .into_response(),
        Err(err) => verify_failure(&err.to_string()),
    }
}

#[utoipa::path(
    get,
    path= "/sso/logout",
    responses (
        (status = 200, description = "Session dropped and cookie cleared"),
    ),
    tag= "sso"
)]
#[instrument(skip(broker, settings, headers))]
pub async fn sso_logout(
    Extension(broker): Extension<Arc<SsoBroker>>,
    Extension(settings): Extension<Arc<Settings>>,
    headers: HeaderMap,
) -> Response {
    if let Some(session_id) = cookie_value(&headers, SSO_COOKIE) {
        broker.logout(&session_id).await;
    }

    let mut response = Json(serde_json::json!({ "message": "Logged out" })).into_response();
    if let Ok(value) = HeaderValue::from_str(&clear_cookie(settings.cookie_secure)) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

fn authentication_required() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Authentication required" })),
    )
        .into_response()
}

fn verify_failure(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(SsoVerifyResponse {
            valid: false,
            user: None,
            error: Some(reason.to_string()),
        }),
    )
        .into_response()
}

/// Extract one cookie by name from the Cookie header.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

fn session_cookie(session_id: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{SSO_COOKIE}={session_id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_TTL.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_cookie(secure: bool) -> String {
    let mut cookie = format!("{SSO_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sso_session=abc123; lang=en"),
        );
        assert_eq!(
            cookie_value(&headers, SSO_COOKIE),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn cookie_value_ignores_missing_and_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(cookie_value(&headers, SSO_COOKIE), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("sso_session="));
        assert_eq!(cookie_value(&headers, SSO_COOKIE), None);
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let cookie = session_cookie("abc", false);
        assert!(cookie.starts_with("sso_session=abc; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn secure_flag_is_opt_in() {
        assert!(session_cookie("abc", true).ends_with("; Secure"));
        assert!(clear_cookie(true).ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_cookie(false).contains("Max-Age=0"));
    }
}
