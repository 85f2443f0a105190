//! Notification channels.
//!
//! Channel kinds are a closed set. Each kind gets at most one sender in the
//! [`ChannelRegistry`], built once at startup. Notification messages carry the
//! channel as a free-form string; resolving it against the registry is where an
//! unknown channel is detected.

mod gateway;
mod log_sender;
mod registry;
pub mod template;

pub use gateway::HttpGatewaySender;
pub use log_sender::LogSender;
pub use registry::{ChannelRegistry, RegistryError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use walle_sdk::objects::NotificationEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Push,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Push => "push",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown channel kind: {0}")]
pub struct UnknownChannelKind(pub String);

impl FromStr for ChannelKind {
    type Err = UnknownChannelKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ChannelKind::Email),
            "sms" => Ok(ChannelKind::Sms),
            "push" => Ok(ChannelKind::Push),
            other => Err(UnknownChannelKind(other.to_string())),
        }
    }
}

/// Errors from a single delivery attempt.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected notification with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("template error: {0}")]
    Template(#[from] template::TemplateError),
}

/// Errors the dispatcher logs per message. None of them stop dispatching.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("channel not registered: {0}")]
    ChannelNotRegistered(String),

    #[error("malformed notification: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{channel} delivery failed: {source}")]
    Send {
        channel: ChannelKind,
        #[source]
        source: SendError,
    },
}

/// Delivers notifications over one channel.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &NotificationEvent) -> Result<(), SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_round_trips_through_str() {
        for kind in [ChannelKind::Email, ChannelKind::Sms, ChannelKind::Push] {
            assert_eq!(kind.as_str().parse::<ChannelKind>().unwrap(), kind);
        }
        assert_eq!(
            "fax".parse::<ChannelKind>(),
            Err(UnknownChannelKind("fax".to_string()))
        );
        assert!("Email".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn dispatch_error_messages() {
        let err = DispatchError::ChannelNotRegistered("sms".to_string());
        assert_eq!(err.to_string(), "channel not registered: sms");
    }
}
