//! Email delivery through a Resend-compatible HTTP API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

use super::{ChannelKind, DeliveryChannel, DeliveryError};
use crate::sesamo::APP_USER_AGENT;

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

pub struct EmailChannel {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    from: String,
}

impl EmailChannel {
    pub fn new(
        api_url: String,
        api_key: SecretString,
        from: String,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| DeliveryError {
                channel: ChannelKind::Email,
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(
        &self,
        destination: &str,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<(), DeliveryError> {
        let payload = EmailPayload {
            from: &self.from,
            to: [destination],
            subject: "Your one-time code",
            html: format!(
                "<p>Your one-time code is <strong>{code}</strong>.</p>\
                 <p>It expires in {ttl_minutes} minutes. If you did not request \
                 it, you can ignore this message.</p>"
            ),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_url.trim_end_matches('/')))
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|err| DeliveryError {
                channel: ChannelKind::Email,
                reason: err.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError {
                channel: ChannelKind::Email,
                reason: format!("provider returned {}", response.status()),
            })
        }
    }
}
