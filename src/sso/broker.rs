//! The SSO session broker.
//!
//! One interactive login creates a session; every later relying-party
//! redirect inside the TTL window gets a fresh token without re-prompting.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::redirect::is_valid_redirect;
use super::store::{SessionStore, SsoSession};
use crate::sesamo::error::AuthError;
use crate::store;
use crate::token::{Claims, TokenIssuer, SESSION_TTL as TOKEN_TTL};

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Result of an interactive SSO login.
#[derive(Debug)]
pub struct SsoLogin {
    /// Opaque session id, to be set as an HTTP-only cookie by the caller.
    pub session_id: String,
    pub token: String,
    pub redirect_to: String,
}

/// Result of a cookie-based auto-login.
#[derive(Debug)]
pub struct AutoLogin {
    pub token: String,
    pub redirect_to: String,
}

pub struct SsoBroker {
    pool: PgPool,
    issuer: Arc<TokenIssuer>,
    sessions: Arc<dyn SessionStore>,
    allowed_domains: Vec<String>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SsoBroker {
    #[must_use]
    pub fn new(
        pool: PgPool,
        issuer: Arc<TokenIssuer>,
        sessions: Arc<dyn SessionStore>,
        allowed_domains: Vec<String>,
    ) -> Self {
        Self {
            pool,
            issuer,
            sessions,
            allowed_domains,
            sweeper: Mutex::new(None),
        }
    }

    /// Interactive login. The redirect is validated before any credential
    /// check; no session is created for a rejected target.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        redirect: &str,
    ) -> Result<SsoLogin, AuthError> {
        if !is_valid_redirect(redirect, &self.allowed_domains) {
            return Err(AuthError::Validation("Invalid redirect URL"));
        }

        let Some(user) = store::find_by_email(&self.pool, email).await? else {
            return Err(AuthError::Unauthorized);
        };
        if !user.check_password(password) {
            return Err(AuthError::Unauthorized);
        }
        if !user.state().allows_login() {
            return Err(AuthError::NotVerified);
        }

        let session_id = generate_session_id();
        self.sessions
            .put(
                session_id.clone(),
                SsoSession {
                    user_id: user.id,
                    email: user.email.clone(),
                    username: user.username.clone(),
                    created_at_unix: now_unix(),
                },
            )
            .await;

        let token =
            self.issuer
                .issue(user.id, &user.email, user.username.as_deref(), TOKEN_TTL)?;
        info!(user_id = user.id, "sso login");

        Ok(SsoLogin {
            session_id,
            redirect_to: append_token(redirect, &token),
            token,
        })
    }

    /// Cookie-based login: a live session skips credential checks entirely.
    /// Stale sessions are rejected here regardless of sweep timing.
    pub async fn auto_login(
        &self,
        session_id: &str,
        redirect: &str,
    ) -> Result<AutoLogin, AuthError> {
        if !is_valid_redirect(redirect, &self.allowed_domains) {
            return Err(AuthError::Validation("Invalid redirect URL"));
        }

        let Some(session) = self.sessions.get(session_id).await else {
            return Err(AuthError::Unauthorized);
        };
        if session.is_expired(now_unix()) {
            self.sessions.delete(session_id).await;
            return Err(AuthError::Unauthorized);
        }

        let token = self.issuer.issue(
            session.user_id,
            &session.email,
            session.username.as_deref(),
            TOKEN_TTL,
        )?;
        debug!(user_id = session.user_id, "sso auto-login");

        Ok(AutoLogin {
            redirect_to: append_token(redirect, &token),
            token,
        })
    }

    /// Verify a presented bearer token and re-check the account behind it.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.issuer.verify(token)?;
        match store::find_by_id(&self.pool, claims.sub).await? {
            Some(user) if user.state().allows_login() => Ok(claims),
            _ => Err(AuthError::TokenInvalid),
        }
    }

    /// Drop a session. Idempotent.
    pub async fn logout(&self, session_id: &str) {
        self.sessions.delete(session_id).await;
    }

    /// Start the hourly sweep. Owned by the broker: aborted on
    /// [`Self::shutdown`], never left running as a detached global.
    pub fn start_sweeper(self: &Arc<Self>) {
        let broker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = broker.sessions.sweep(now_unix()).await;
                if removed > 0 {
                    debug!(removed, "swept expired sso sessions");
                }
            }
        });
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
    }

    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for SsoBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// High-entropy opaque session id. The raw value only ever lives in the
/// cookie and the session store.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

fn append_token(redirect: &str, token: &str) -> String {
    if redirect.contains('?') {
        format!("{redirect}&token={token}")
    } else {
        format!("{redirect}?token={token}")
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
