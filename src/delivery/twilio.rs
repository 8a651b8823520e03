//! SMS and WhatsApp delivery through the Twilio Messages API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

use super::{ChannelKind, DeliveryChannel, DeliveryError};
use crate::sesamo::APP_USER_AGENT;

#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Sender for plain SMS, E.164.
    pub sms_from: String,
    /// Sender for WhatsApp, E.164 without the `whatsapp:` prefix.
    pub whatsapp_from: String,
    /// Prepended to bare national numbers, e.g. `+91`.
    pub default_country_code: String,
    pub timeout: Duration,
}

struct TwilioClient {
    client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioClient {
    fn new(config: TwilioConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|err| DeliveryError {
                channel: ChannelKind::Sms,
                reason: err.to_string(),
            })?;
        Ok(Self { client, config })
    }

    async fn send_message(
        &self,
        channel: ChannelKind,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let response = self
            .client
            .post(url)
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|err| DeliveryError {
                channel,
                reason: err.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError {
                channel,
                reason: format!("provider returned {}", response.status()),
            })
        }
    }
}

pub struct SmsChannel {
    inner: Arc<TwilioClient>,
}

pub struct WhatsappChannel {
    inner: Arc<TwilioClient>,
}

/// Build both Twilio-backed channels over one shared HTTP client.
pub fn channels(config: TwilioConfig) -> Result<(SmsChannel, WhatsappChannel), DeliveryError> {
    let inner = Arc::new(TwilioClient::new(config)?);
    Ok((
        SmsChannel {
            inner: Arc::clone(&inner),
        },
        WhatsappChannel { inner },
    ))
}

#[async_trait]
impl DeliveryChannel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(
        &self,
        destination: &str,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<(), DeliveryError> {
        let to = normalize_number(destination, &self.inner.config.default_country_code);
        let body = message_body(code, ttl_minutes);
        self.inner
            .send_message(ChannelKind::Sms, &self.inner.config.sms_from, &to, &body)
            .await
    }
}

#[async_trait]
impl DeliveryChannel for WhatsappChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Whatsapp
    }

    async fn send(
        &self,
        destination: &str,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<(), DeliveryError> {
        let to = format!(
            "whatsapp:{}",
            normalize_number(destination, &self.inner.config.default_country_code)
        );
        let from = format!("whatsapp:{}", self.inner.config.whatsapp_from);
        let body = message_body(code, ttl_minutes);
        self.inner
            .send_message(ChannelKind::Whatsapp, &from, &to, &body)
            .await
    }
}

fn message_body(code: &str, ttl_minutes: u64) -> String {
    format!("Your one-time code is {code}. It expires in {ttl_minutes} minutes.")
}

/// Strip formatting characters and prepend the default country code when the
/// number has no `+` prefix.
fn normalize_number(raw: &str, default_country_code: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if cleaned.starts_with('+') {
        cleaned
    } else {
        format!("{default_country_code}{cleaned}")
    }
}
