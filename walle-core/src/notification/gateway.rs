use super::template::render;
use super::{ChannelKind, NotificationSender, SendError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use url::Url;
use walle_sdk::objects::NotificationEvent;

/// Body POSTed to the channel gateway.
#[derive(Debug, Serialize)]
struct GatewayPayload<'a> {
    channel: ChannelKind,
    subject: &'a str,
    body: &'a str,
    data: &'a serde_json::Map<String, serde_json::Value>,
}

/// Hands notifications to an HTTP gateway (mail relay, SMS provider, push
/// service). Any non-2xx response is a failed delivery.
pub struct HttpGatewaySender {
    channel: ChannelKind,
    url: Url,
    http_client: reqwest::Client,
}

impl HttpGatewaySender {
    pub fn new(channel: ChannelKind, url: Url, timeout: Duration) -> Self {
        Self {
            channel,
            url,
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl NotificationSender for HttpGatewaySender {
    async fn send(&self, notification: &NotificationEvent) -> Result<(), SendError> {
        let message = render(notification)?;
        let payload = GatewayPayload {
            channel: self.channel,
            subject: &message.subject,
            body: &message.body,
            data: &notification.data,
        };

        let response = self
            .http_client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
