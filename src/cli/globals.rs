use secrecy::SecretString;
use std::time::Duration;

/// Configuration shared by the server and its delivery channels.
#[derive(Clone)]
pub struct GlobalArgs {
    pub jwt_secret: SecretString,
    pub allowed_redirect_domains: Vec<String>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<SecretString>,
    pub email_from: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<SecretString>,
    pub twilio_sms_from: Option<String>,
    pub twilio_whatsapp_from: Option<String>,
    pub whatsapp_default_country_code: String,
    pub delivery_timeout: Duration,
    pub cookie_secure: bool,
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("jwt_secret", &"***")
            .field("allowed_redirect_domains", &self.allowed_redirect_domains)
            .field("email_api_url", &self.email_api_url)
            .field("email_api_key", &self.email_api_key.as_ref().map(|_| "***"))
            .field("email_from", &self.email_from)
            .field("twilio_account_sid", &self.twilio_account_sid)
            .field(
                "twilio_auth_token",
                &self.twilio_auth_token.as_ref().map(|_| "***"),
            )
            .field("twilio_sms_from", &self.twilio_sms_from)
            .field("twilio_whatsapp_from", &self.twilio_whatsapp_from)
            .field(
                "whatsapp_default_country_code",
                &self.whatsapp_default_country_code,
            )
            .field("delivery_timeout", &self.delivery_timeout)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}
