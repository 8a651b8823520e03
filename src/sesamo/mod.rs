//! Service assembly: database pool, router, middleware and the HTTP server.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cli::globals::GlobalArgs;
use crate::delivery::{
    twilio_channels, ConsoleChannel, Delivery, DeliveryChannel, EmailChannel, TwilioConfig,
};
use crate::sso::{InMemorySessionStore, SsoBroker};
use crate::store;
use crate::token::TokenIssuer;

pub mod error;
pub mod handlers;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Per-process knobs the handlers need besides their shared services.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Mark the SSO cookie `Secure`; off for plain-HTTP development.
    pub cookie_secure: bool,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::register::register,
        handlers::auth::verification::send_verification,
        handlers::auth::verification::verify_account,
        handlers::auth::login::login,
        handlers::auth::reset::forgot_password,
        handlers::auth::reset::reset_password,
        handlers::auth::otp_login::send_otp,
        handlers::auth::otp_login::verify_otp,
        handlers::auth::oauth::oauth_callback,
        handlers::sso::sso_auto_login,
        handlers::sso::sso_login,
        handlers::sso::sso_verify,
        handlers::sso::sso_logout,
    ),
    components(
        schemas(
            handlers::health::Health,
            handlers::auth::types::RegisterRequest,
            handlers::auth::types::RegisterResponse,
            handlers::auth::types::CodeRequest,
            handlers::auth::types::LoginRequest,
            handlers::auth::types::ResetPasswordRequest,
            handlers::auth::types::SendOtpRequest,
            handlers::auth::types::Message,
            handlers::auth::types::UserInfo,
            handlers::auth::types::SessionResponse,
            handlers::auth::types::TokenPairResponse,
            handlers::sso::SsoLoginRequest,
            handlers::sso::SsoIdentity,
            handlers::sso::SsoVerifyResponse,
            crate::delivery::ChannelKind,
            crate::oauth::Provider,
            crate::oauth::ProfileEmail,
            crate::oauth::ExternalProfile,
        )
    ),
    tags(
        (name = "auth", description = "Registration, password, OTP and OAuth login"),
        (name = "sso", description = "Single-sign-on token broker"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build every shared service, wire the router and serve until ctrl-c.
/// # Errors
/// Returns an error if the server fails to start
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    store::migrate(&pool)
        .await
        .context("Failed to run migrations")?;

    let issuer = Arc::new(TokenIssuer::new(&globals.jwt_secret));
    let sessions = Arc::new(InMemorySessionStore::new());
    let broker = Arc::new(SsoBroker::new(
        pool.clone(),
        Arc::clone(&issuer),
        sessions,
        globals.allowed_redirect_domains.clone(),
    ));
    broker.start_sweeper();

    let delivery = Arc::new(build_delivery(globals)?);
    let settings = Arc::new(Settings {
        cookie_secure: globals.cookie_secure,
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi()))
        .route("/auth/register", post(handlers::auth::register))
        .route(
            "/auth/send-verification",
            post(handlers::auth::send_verification),
        )
        .route("/auth/verify-account", post(handlers::auth::verify_account))
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .route("/auth/send-otp", post(handlers::auth::send_otp))
        .route("/auth/verify-otp", post(handlers::auth::verify_otp))
        .route("/auth/oauth/:provider", post(handlers::auth::oauth_callback))
        .route(
            "/sso/login",
            get(handlers::sso::sso_auto_login).post(handlers::sso::sso_login),
        )
        .route("/sso/verify", get(handlers::sso::sso_verify))
        .route("/sso/logout", get(handlers::sso::sso_logout))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| request_id(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(pool.clone()))
                .layer(Extension(issuer))
                .layer(Extension(Arc::clone(&broker)))
                .layer(Extension(delivery))
                .layer(Extension(settings)),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    broker.shutdown();

    Ok(())
}

/// Assemble delivery channels from the configuration: a Resend-compatible
/// email provider when configured (console logging otherwise), plus Twilio
/// SMS and WhatsApp when credentials are present.
fn build_delivery(globals: &GlobalArgs) -> Result<Delivery> {
    let email: Arc<dyn DeliveryChannel> =
        match (&globals.email_api_url, &globals.email_api_key) {
            (Some(url), Some(key)) => Arc::new(
                EmailChannel::new(
                    url.clone(),
                    key.clone(),
                    globals.email_from.clone(),
                    globals.delivery_timeout,
                )
                .context("Failed to build email channel")?,
            ),
            _ => {
                info!("No email provider configured, codes are logged instead");
                Arc::new(ConsoleChannel::new())
            }
        };

    let twilio = match (
        &globals.twilio_account_sid,
        &globals.twilio_auth_token,
        &globals.twilio_sms_from,
        &globals.twilio_whatsapp_from,
    ) {
        (Some(sid), Some(token), Some(sms_from), Some(whatsapp_from)) => {
            let (sms, whatsapp) = twilio_channels(TwilioConfig {
                account_sid: sid.clone(),
                auth_token: token.clone(),
                sms_from: sms_from.clone(),
                whatsapp_from: whatsapp_from.clone(),
                default_country_code: globals.whatsapp_default_country_code.clone(),
                timeout: globals.delivery_timeout,
            })
            .context("Failed to build Twilio channels")?;
            Some((sms, whatsapp))
        }
        _ => None,
    };

    Ok(match twilio {
        Some((sms, whatsapp)) => Delivery::new(email, Some(Arc::new(sms)), Some(Arc::new(whatsapp))),
        None => Delivery::new(email, None, None),
    })
}

fn request_id() -> Option<HeaderValue> {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    HeaderValue::from_str(&Base64UrlUnpadded::encode_string(&bytes)).ok()
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_header_values() {
        let first = request_id().unwrap();
        let second = request_id().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/auth/register",
            "/auth/send-verification",
            "/auth/verify-account",
            "/auth/login",
            "/auth/forgot-password",
            "/auth/reset-password",
            "/auth/send-otp",
            "/auth/verify-otp",
            "/auth/oauth/{provider}",
            "/sso/login",
            "/sso/verify",
            "/sso/logout",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
