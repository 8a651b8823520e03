//! Development-only channel that logs codes instead of sending them.
//! Active when no email provider is configured.

use async_trait::async_trait;
use tracing::info;

use super::{ChannelKind, DeliveryChannel, DeliveryError};

#[derive(Default)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliveryChannel for ConsoleChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(
        &self,
        destination: &str,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<(), DeliveryError> {
        info!(destination, code, ttl_minutes, "console delivery");
        Ok(())
    }
}
