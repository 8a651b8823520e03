use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::sesamo::new;
use anyhow::Result;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            // Fail early on a malformed DSN instead of at pool connect time.
            let dsn = Url::parse(&dsn)?;

            new(port, dsn.to_string(), globals).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    #[tokio::test]
    async fn rejects_malformed_dsn() {
        let globals = GlobalArgs {
            jwt_secret: SecretString::from("secret".to_string()),
            allowed_redirect_domains: vec!["example.com".to_string()],
            email_api_url: None,
            email_api_key: None,
            email_from: "no-reply@localhost".to_string(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_sms_from: None,
            twilio_whatsapp_from: None,
            whatsapp_default_country_code: "+91".to_string(),
            delivery_timeout: Duration::from_secs(10),
            cookie_secure: false,
        };

        let action = Action::Server {
            port: 0,
            dsn: "not a dsn".to_string(),
        };
        assert!(handle(action, &globals).await.is_err());
    }
}
