//! Single-sign-on: session broker, redirect validation, session storage.

pub mod broker;
pub mod redirect;
pub mod store;

pub use broker::{AutoLogin, SsoBroker, SsoLogin, SWEEP_INTERVAL};
pub use redirect::is_valid_redirect;
pub use store::{InMemorySessionStore, SessionStore, SsoSession, SESSION_TTL};
