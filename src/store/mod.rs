//! Credential store: user identity records and password verification.

pub mod password;
pub mod users;

pub use users::{
    create, find_by_email, find_by_id, find_by_provider_id, mark_verified, migrate, set_password,
    set_provider_id, update_email, AccountState, CreateOutcome, NewUser, User,
};

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
    use sqlx::PgPool;
    use std::time::Duration;

    /// Lazy pool whose first acquire fails fast. Tests use it two ways:
    /// success proves a code path never touched the database, failure
    /// proves it tried to.
    pub(crate) fn unreachable_pool() -> PgPool {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("invalid")
            .database("invalid")
            .ssl_mode(PgSslMode::Disable);
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(options)
    }
}
