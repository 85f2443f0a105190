use super::template::render;
use super::{ChannelKind, NotificationSender, SendError};
use async_trait::async_trait;
use tracing::info;
use walle_sdk::objects::NotificationEvent;

/// Renders the notification and writes it to the log instead of a gateway.
pub struct LogSender {
    channel: ChannelKind,
}

impl LogSender {
    pub fn new(channel: ChannelKind) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, notification: &NotificationEvent) -> Result<(), SendError> {
        let message = render(notification)?;
        info!(
            channel = %self.channel,
            subject = %message.subject,
            body = %message.body,
            "Notification delivered"
        );
        Ok(())
    }
}
