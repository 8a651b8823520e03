//! Reconciles an external OAuth profile to a local user.

use anyhow::anyhow;
use sqlx::PgPool;
use tracing::{debug, info};

use super::profile::{
    is_placeholder, placeholder_email, preferred_email, ExternalProfile, Provider,
};
use crate::store::{self, CreateOutcome, NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("profile has no usable email or username")]
    ProfileIncomplete,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Resolve a profile to a user, in this order:
///
/// 1. provider id already linked: return that user, upgrading a placeholder
///    email to a newly available verified one;
/// 2. best profile email matches an existing account: link the provider id
///    to it;
/// 3. otherwise create a verified, passwordless account, synthesizing a
///    placeholder email when the provider yields none.
///
/// The order matters: a linked provider id wins over an email match, so a
/// user who changes their provider email keeps their account.
///
/// Every branch returns a verified user: the provider vouched for the
/// identity, so an unverified password account is promoted on its first
/// OAuth login.
pub async fn resolve(
    pool: &PgPool,
    provider: Provider,
    profile: &ExternalProfile,
) -> Result<User, LinkError> {
    if let Some(mut user) = store::find_by_provider_id(pool, provider, &profile.provider_id).await?
    {
        debug!(user_id = user.id, %provider, "provider id already linked");
        if is_placeholder(&user.email, provider) {
            if let Some(real) = verified_email(profile) {
                store::update_email(pool, user.id, real).await?;
                info!(user_id = user.id, "replaced placeholder email");
                user.email = real.to_string();
            }
        }
        promote_to_verified(pool, &mut user).await?;
        return Ok(user);
    }

    let resolved = preferred_email(&profile.emails);

    if let Some(email) = resolved {
        if let Some(mut user) = store::find_by_email(pool, email).await? {
            if provider_id_of(&user, provider).is_none() {
                store::set_provider_id(pool, user.id, provider, &profile.provider_id).await?;
                info!(user_id = user.id, %provider, "linked provider to existing account");
            }
            promote_to_verified(pool, &mut user).await?;
            return store::find_by_id(pool, user.id)
                .await?
                .ok_or_else(|| LinkError::Internal(anyhow!("linked user vanished")));
        }
    }

    let email = match resolved {
        Some(email) => email.to_string(),
        None => {
            let Some(username) = profile.username.as_deref() else {
                return Err(LinkError::ProfileIncomplete);
            };
            placeholder_email(username, provider)
        }
    };

    let fields = NewUser {
        username: Some(profile.name_hint(&email)),
        email: &email,
        password: None,
        phone: None,
        provider: Some((provider, &profile.provider_id)),
        // The provider vouched for this identity.
        verified: true,
    };
    match store::create(pool, &fields).await? {
        CreateOutcome::Created(user) => {
            info!(user_id = user.id, %provider, "created account from oauth profile");
            Ok(user)
        }
        CreateOutcome::Conflict => Err(LinkError::Internal(anyhow!(
            "email taken while resolving oauth profile"
        ))),
    }
}

/// Mark an account verified once a vouching provider resolved to it, so the
/// session token issued afterwards is accepted by the rest of the service.
async fn promote_to_verified(pool: &PgPool, user: &mut User) -> Result<(), LinkError> {
    if !user.verified {
        store::mark_verified(pool, user.id).await?;
        user.verified = true;
        info!(user_id = user.id, "oauth provider vouched for account");
    }
    Ok(())
}

fn verified_email(profile: &ExternalProfile) -> Option<&str> {
    profile
        .emails
        .iter()
        .find(|email| email.verified)
        .map(|email| email.address.as_str())
}

const fn provider_id_of(user: &User, provider: Provider) -> Option<&String> {
    match provider {
        Provider::Google => user.google_id.as_ref(),
        Provider::Github => user.github_id.as_ref(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::profile::ProfileEmail;
    use crate::store::test_support::unreachable_pool;

    fn profile(emails: Vec<ProfileEmail>, username: Option<&str>) -> ExternalProfile {
        ExternalProfile {
            provider_id: "ext-1".to_string(),
            emails,
            username: username.map(str::to_string),
            display_name: None,
        }
    }

    #[test]
    fn verified_email_skips_unverified() {
        let profile = profile(
            vec![
                ProfileEmail {
                    address: "unverified@example.com".to_string(),
                    primary: true,
                    verified: false,
                },
                ProfileEmail {
                    address: "verified@example.com".to_string(),
                    primary: false,
                    verified: true,
                },
            ],
            None,
        );
        assert_eq!(verified_email(&profile), Some("verified@example.com"));
    }

    #[test]
    fn provider_id_of_reads_matching_slot() {
        let user = user(true);
        assert_eq!(
            provider_id_of(&user, Provider::Google).map(String::as_str),
            Some("g-1")
        );
        assert_eq!(provider_id_of(&user, Provider::Github), None);
    }

    fn user(verified: bool) -> User {
        User {
            id: 1,
            username: None,
            email: "a@example.com".to_string(),
            password_hash: None,
            phone: None,
            google_id: Some("g-1".to_string()),
            github_id: None,
            verified,
        }
    }

    #[tokio::test]
    async fn promotion_skips_already_verified_accounts() {
        // The pool cannot connect, so success means no write was issued.
        let pool = unreachable_pool();
        let mut user = user(true);
        promote_to_verified(&pool, &mut user).await.unwrap();
        assert!(user.verified);
    }

    #[tokio::test]
    async fn promotion_writes_for_unverified_accounts() {
        // Same pool: the error shows the verified flag update was attempted.
        let pool = unreachable_pool();
        let mut user = user(false);
        assert!(promote_to_verified(&pool, &mut user).await.is_err());
    }
}
