use super::ConsumerConfig;
use crate::notification::ChannelKind;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    pub consumer: ConsumerConfig,
    /// Channel named in the notification emitted for every applied credit.
    pub notification_channel: ChannelKind,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            consumer: ConsumerConfig::settlement(),
            notification_channel: ChannelKind::Email,
        }
    }
}

/// Where a channel's notifications go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTarget {
    Gateway(Url),
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub target: ChannelTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub consumer: ConsumerConfig,
    pub channels: Vec<ChannelConfig>,
    /// Per-request timeout of gateway senders. Must stay below the bus
    /// redelivery timeout, or a slow gateway gets the message handed out twice.
    pub send_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            consumer: ConsumerConfig::notification(),
            channels: vec![ChannelConfig {
                kind: ChannelKind::Email,
                target: ChannelTarget::Log,
            }],
            send_timeout: Duration::from_secs(10),
        }
    }
}
