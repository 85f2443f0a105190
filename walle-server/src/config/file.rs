//! TOML file configuration structures.
//!
//! These structs directly map to the `walle-config.toml` file format. Every
//! section is optional; a missing knob falls back to the pipeline default.

use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;
use walle_core::notification::ChannelKind;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub bus: BusConfig,
    pub settlement: SettlementConfig,
    pub completion: ConsumerConfig,
    pub notification: NotificationConfig,
    pub capture: CaptureConfig,
    pub outbox: OutboxConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    pub redelivery_timeout_ms: Option<u64>,
}

/// Knobs shared by every consumer section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumerConfig {
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub fetch_timeout_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
    pub flush_threshold: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettlementConfig {
    #[serde(flatten)]
    pub consumer: ConsumerConfig,
    /// Channel used for the deposit notification.
    pub notification_channel: Option<ChannelKind>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    #[serde(flatten)]
    pub consumer: ConsumerConfig,
    /// Per-request timeout of gateway channels.
    pub send_timeout_ms: Option<u64>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// One `[[notification.channels]]` entry. Exactly one of `gateway_url` and
/// `log` must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub gateway_url: Option<Url>,
    #[serde(default)]
    pub log: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    pub lag_secs: Option<u64>,
    pub window_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    /// Period of the in-process schedule; `0` disables it.
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboxConfig {
    pub poll_interval_ms: Option<u64>,
    pub batch_size: Option<usize>,
    pub min_age_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[bus]
redelivery_timeout_ms = 10000

[settlement]
workers = 4
batch_size = 20
flush_threshold = 5
notification_channel = "sms"

[completion]
batch_size = 200

[notification]
workers = 2

[[notification.channels]]
kind = "email"
gateway_url = "https://mail.internal/send"

[[notification.channels]]
kind = "sms"
log = true

[capture]
lag_secs = 1800
window_secs = 900
interval_secs = 0

[outbox]
min_age_secs = 30
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.bus.redelivery_timeout_ms, Some(10000));
        assert_eq!(config.settlement.consumer.workers, Some(4));
        assert_eq!(config.settlement.notification_channel, Some(ChannelKind::Sms));
        assert_eq!(config.completion.batch_size, Some(200));
        assert_eq!(config.notification.consumer.workers, Some(2));
        assert_eq!(config.notification.channels.len(), 2);
        assert_eq!(config.notification.channels[0].kind, ChannelKind::Email);
        assert!(config.notification.channels[0].gateway_url.is_some());
        assert!(config.notification.channels[1].log);
        assert_eq!(config.capture.interval_secs, Some(0));
        assert_eq!(config.outbox.min_age_secs, Some(30));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert!(config.notification.channels.is_empty());
        assert!(config.settlement.notification_channel.is_none());
    }

    #[test]
    fn test_unknown_channel_kind_is_rejected() {
        let toml_str = r#"
[[notification.channels]]
kind = "fax"
log = true
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
