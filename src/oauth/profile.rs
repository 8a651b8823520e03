//! Normalized OAuth profiles and email resolution.
//!
//! Email preference is a pure, ordered function over the profile; nothing in
//! this module talks to the network.

use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }

    /// Column holding this provider's external id on the user row.
    #[must_use]
    pub const fn id_column(self) -> &'static str {
        match self {
            Self::Google => "google_id",
            Self::Github => "github_id",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "google" => Some(Self::Google),
            "github" => Some(Self::Github),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One email address as reported by the provider.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileEmail {
    pub address: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// A provider profile after the transport layer has normalized it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExternalProfile {
    pub provider_id: String,
    #[serde(default)]
    pub emails: Vec<ProfileEmail>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ExternalProfile {
    /// Display name for a newly created account: explicit name, then the
    /// external username, then the local part of the resolved email.
    #[must_use]
    pub fn name_hint<'a>(&'a self, email: &'a str) -> &'a str {
        self.username
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email))
    }
}

/// Pick the best email: primary and provider-verified first, then any
/// provider-verified one, then the first reported address.
#[must_use]
pub fn preferred_email(emails: &[ProfileEmail]) -> Option<&str> {
    emails
        .iter()
        .find(|email| email.primary && email.verified)
        .or_else(|| emails.iter().find(|email| email.verified))
        .or_else(|| emails.first())
        .map(|email| email.address.as_str())
}

/// Synthesized address used when a provider yields no usable email, so an
/// OAuth login never dead-ends. Replaced once a real email shows up.
#[must_use]
pub fn placeholder_email(username: &str, provider: Provider) -> String {
    format!("{username}@{provider}-oauth.local")
}

#[must_use]
pub fn is_placeholder(email: &str, provider: Provider) -> bool {
    email.ends_with(&format!("@{provider}-oauth.local"))
}
