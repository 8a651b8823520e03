//! Redirect target validation against the operator allow-list.

use url::Url;

/// Accept a redirect target only when it parses as an absolute URL whose
/// host is one of the allowed domains or a subdomain of one. Suffix matching
/// stops at a dot boundary so `evilexample.com` never matches `example.com`.
#[must_use]
pub fn is_valid_redirect(target: &str, allowed_domains: &[String]) -> bool {
    let Ok(parsed) = Url::parse(target) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    allowed_domains.iter().any(|domain| {
        let domain = domain.trim().to_ascii_lowercase();
        !domain.is_empty() && (host == domain || host.ends_with(&format!(".{domain}")))
    })
}
