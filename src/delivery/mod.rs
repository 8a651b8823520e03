//! Out-of-band OTP delivery.
//!
//! Channels are fire-and-report: a slow or failing transport surfaces as a
//! recoverable error and the dispatcher makes at most one same-request hop
//! to the alternate channel. Nothing here retries in a loop.

pub mod console;
pub mod email;
pub mod twilio;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::store::User;

pub use console::ConsoleChannel;
pub use email::EmailChannel;
pub use twilio::{channels as twilio_channels, SmsChannel, TwilioConfig, WhatsappChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Whatsapp,
}

impl ChannelKind {
    /// Wording used in user-facing "sent to your ..." messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "phone",
            Self::Whatsapp => "WhatsApp",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("delivery via {channel:?} failed: {reason}")]
pub struct DeliveryError {
    pub channel: ChannelKind,
    pub reason: String,
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Deliver a code to a destination. Must return within the configured
    /// transport timeout; holding database locks across this call is a bug
    /// in the caller.
    async fn send(
        &self,
        destination: &str,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<(), DeliveryError>;
}

/// Routes a code to the user's channels with one fallback hop.
pub struct Delivery {
    email: Arc<dyn DeliveryChannel>,
    sms: Option<Arc<dyn DeliveryChannel>>,
    whatsapp: Option<Arc<dyn DeliveryChannel>>,
}

impl Delivery {
    #[must_use]
    pub fn new(
        email: Arc<dyn DeliveryChannel>,
        sms: Option<Arc<dyn DeliveryChannel>>,
        whatsapp: Option<Arc<dyn DeliveryChannel>>,
    ) -> Self {
        Self {
            email,
            sms,
            whatsapp,
        }
    }

    /// Send `code` to the user, honoring the requested channel when the user
    /// can receive it and falling back to email on failure.
    pub async fn send_code(
        &self,
        user: &User,
        requested: Option<ChannelKind>,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<ChannelKind, DeliveryError> {
        let phone_channel = match requested {
            Some(ChannelKind::Whatsapp) => self.whatsapp.as_ref(),
            Some(ChannelKind::Sms) => self.sms.as_ref(),
            _ => None,
        };

        if let (Some(channel), Some(phone)) = (phone_channel, user.phone.as_deref()) {
            match channel.send(phone, code, ttl_minutes).await {
                Ok(()) => {
                    info!(user_id = user.id, channel = ?channel.kind(), "otp sent");
                    return Ok(channel.kind());
                }
                Err(err) => {
                    warn!(user_id = user.id, "falling back to email: {err}");
                }
            }
        }

        self.email.send(&user.email, code, ttl_minutes).await?;
        info!(user_id = user.id, "otp sent via email");
        Ok(ChannelKind::Email)
    }
}
