//! Configuration module for walle-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{
    ChannelConfig as FileChannelConfig, ConsumerConfig as FileConsumerConfig, FileConfig,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use walle_core::config::{
    BusConfig, CaptureConfig, ChannelConfig, ChannelTarget, ConsumerConfig, DispatcherConfig,
    OutboxConfig, PipelineConfig, SettlementConfig,
};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read the TOML file, apply CLI overrides and validate the result.
    ///
    /// A missing file is not an error: the built-in defaults are used.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let file_config: FileConfig = if self.config_path.exists() {
            let config_content = std::fs::read_to_string(&self.config_path)?;
            toml::from_str(&config_content)?
        } else {
            tracing::warn!(
                path = %self.config_path.display(),
                "Config file not found, using defaults"
            );
            FileConfig::default()
        };
        self.build(file_config)
    }

    fn build(&self, file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        let mut listen = file_config.server.listen;
        if let Some(addr) = self.listen_override {
            listen = addr;
        }

        let defaults = PipelineConfig::default();

        let bus = BusConfig {
            redelivery_timeout: file_config
                .bus
                .redelivery_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.bus.redelivery_timeout),
        };

        let settlement = SettlementConfig {
            consumer: merge_consumer(defaults.settlement.consumer, &file_config.settlement.consumer),
            notification_channel: file_config
                .settlement
                .notification_channel
                .unwrap_or(defaults.settlement.notification_channel),
        };

        let completion = merge_consumer(defaults.completion, &file_config.completion);

        let channels = if file_config.notification.channels.is_empty() {
            defaults.dispatcher.channels
        } else {
            file_config
                .notification
                .channels
                .iter()
                .map(convert_channel)
                .collect::<Result<Vec<_>, _>>()?
        };
        let dispatcher = DispatcherConfig {
            consumer: merge_consumer(
                defaults.dispatcher.consumer,
                &file_config.notification.consumer,
            ),
            channels,
            send_timeout: file_config
                .notification
                .send_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.dispatcher.send_timeout),
        };

        let interval = match file_config.capture.interval_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.capture.interval,
        };
        let capture = CaptureConfig {
            lag: secs_or(file_config.capture.lag_secs, defaults.capture.lag),
            width: secs_or(file_config.capture.window_secs, defaults.capture.width),
            timeout: secs_or(file_config.capture.timeout_secs, defaults.capture.timeout),
            interval,
        };

        let outbox = OutboxConfig {
            poll_interval: file_config
                .outbox
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.outbox.poll_interval),
            batch_size: file_config
                .outbox
                .batch_size
                .unwrap_or(defaults.outbox.batch_size),
            min_age: secs_or(file_config.outbox.min_age_secs, defaults.outbox.min_age),
        };

        let pipeline = PipelineConfig {
            bus,
            settlement,
            completion,
            dispatcher,
            capture,
            outbox,
        };
        validate(&pipeline)?;

        Ok(LoadedConfig {
            server: ServerConfig { listen },
            pipeline,
        })
    }
}

fn secs_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

fn merge_consumer(mut base: ConsumerConfig, file: &FileConsumerConfig) -> ConsumerConfig {
    if let Some(workers) = file.workers {
        base.workers = workers;
    }
    if let Some(batch_size) = file.batch_size {
        base.batch_size = batch_size;
    }
    if let Some(ms) = file.fetch_timeout_ms {
        base.fetch_timeout = Duration::from_millis(ms);
    }
    if let Some(capacity) = file.queue_capacity {
        base.queue_capacity = capacity;
    }
    if let Some(threshold) = file.flush_threshold {
        base.flush_threshold = threshold;
    }
    if let Some(ms) = file.flush_interval_ms {
        base.flush_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = file.shutdown_grace_ms {
        base.shutdown_grace = Duration::from_millis(ms);
    }
    base
}

fn convert_channel(channel: &FileChannelConfig) -> Result<ChannelConfig, ConfigError> {
    let target = match (&channel.gateway_url, channel.log) {
        (Some(url), false) => ChannelTarget::Gateway(url.clone()),
        (None, true) => ChannelTarget::Log,
        _ => {
            return Err(ConfigError::ValidationError(format!(
                "channel {} must set exactly one of gateway_url and log",
                channel.kind
            )));
        }
    };
    Ok(ChannelConfig {
        kind: channel.kind,
        target,
    })
}

fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    for (section, consumer) in [
        ("settlement", &config.settlement.consumer),
        ("completion", &config.completion),
        ("notification", &config.dispatcher.consumer),
    ] {
        consumer
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[{section}] {e}")))?;
    }

    if config.capture.width.is_zero() {
        return Err(ConfigError::ValidationError(
            "[capture] window_secs must be positive".to_string(),
        ));
    }
    if config.capture.timeout.is_zero() {
        return Err(ConfigError::ValidationError(
            "[capture] timeout_secs must be positive".to_string(),
        ));
    }
    if config.outbox.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "[outbox] batch_size must be at least 1".to_string(),
        ));
    }
    if config.outbox.poll_interval.is_zero() {
        return Err(ConfigError::ValidationError(
            "[outbox] poll_interval_ms must be positive".to_string(),
        ));
    }

    if config.bus.redelivery_timeout.is_zero() {
        return Err(ConfigError::ValidationError(
            "[bus] redelivery_timeout_ms must be positive".to_string(),
        ));
    }
    if config.dispatcher.send_timeout.is_zero()
        || config.dispatcher.send_timeout >= config.bus.redelivery_timeout
    {
        return Err(ConfigError::ValidationError(format!(
            "[notification] send_timeout_ms must be positive and below the bus redelivery timeout ({}ms)",
            config.bus.redelivery_timeout.as_millis()
        )));
    }

    if config.dispatcher.channels.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one notification channel is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for channel in &config.dispatcher.channels {
        if !seen.insert(channel.kind) {
            return Err(ConfigError::ValidationError(format!(
                "channel {} is configured twice",
                channel.kind
            )));
        }
    }
    if !seen.contains(&config.settlement.notification_channel) {
        tracing::warn!(
            channel = %config.settlement.notification_channel,
            "Settlement notification channel has no configured sender; notifications will be dropped"
        );
    }
    Ok(())
}

/// Get the ledger database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

/// Get the balance database URL, falling back to the ledger's.
pub fn get_wallet_database_url(ledger_url: &str) -> String {
    std::env::var("WALLET_DATABASE_URL").unwrap_or_else(|_| ledger_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use walle_core::notification::ChannelKind;

    fn load_str(toml_str: &str, listen: Option<SocketAddr>) -> Result<LoadedConfig, ConfigError> {
        let file_config: FileConfig = toml::from_str(toml_str)?;
        ConfigLoader::new("unused.toml", listen).build(file_config)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let loaded = load_str("", None).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(loaded.pipeline.settlement, defaults.settlement);
        assert_eq!(loaded.pipeline.completion, defaults.completion);
        assert_eq!(loaded.pipeline.dispatcher, defaults.dispatcher);
        assert_eq!(loaded.pipeline.capture, defaults.capture);
        assert_eq!(loaded.pipeline.outbox, defaults.outbox);
        assert_eq!(loaded.server.listen.port(), 8080);
    }

    #[test]
    fn overrides_are_merged_onto_defaults() {
        let loaded = load_str(
            r#"
[settlement]
workers = 3
notification_channel = "push"

[[notification.channels]]
kind = "push"
log = true

[capture]
interval_secs = 0
lag_secs = 60
"#,
            Some("127.0.0.1:9000".parse().unwrap()),
        )
        .unwrap();

        assert_eq!(loaded.server.listen.port(), 9000);
        assert_eq!(loaded.pipeline.settlement.consumer.workers, 3);
        assert_eq!(
            loaded.pipeline.settlement.consumer.batch_size,
            ConsumerConfig::settlement().batch_size
        );
        assert_eq!(loaded.pipeline.settlement.notification_channel, ChannelKind::Push);
        assert_eq!(loaded.pipeline.dispatcher.channels.len(), 1);
        assert_eq!(loaded.pipeline.dispatcher.channels[0].target, ChannelTarget::Log);
        assert_eq!(loaded.pipeline.capture.interval, None);
        assert_eq!(loaded.pipeline.capture.lag, Duration::from_secs(60));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = load_str("[completion]\nworkers = 0\n", None).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("completion")));
    }

    #[test]
    fn duplicate_channels_are_rejected() {
        let err = load_str(
            r#"
[[notification.channels]]
kind = "email"
log = true

[[notification.channels]]
kind = "email"
gateway_url = "http://localhost:9999/send"
"#,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn channel_needs_exactly_one_target() {
        let err = load_str(
            r#"
[[notification.channels]]
kind = "sms"
"#,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("sms")));
    }

    #[test]
    fn empty_channel_list_is_rejected() {
        let mut pipeline = PipelineConfig::default();
        pipeline.dispatcher.channels.clear();
        assert!(matches!(validate(&pipeline), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn send_timeout_must_stay_below_redelivery() {
        let err = load_str(
            "[bus]\nredelivery_timeout_ms = 5000\n\n[notification]\nsend_timeout_ms = 5000\n",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("send_timeout_ms")));

        let loaded = load_str(
            "[bus]\nredelivery_timeout_ms = 5000\n\n[notification]\nsend_timeout_ms = 4000\n",
            None,
        )
        .unwrap();
        assert_eq!(loaded.pipeline.dispatcher.send_timeout, Duration::from_secs(4));
    }

    #[test]
    fn default_send_timeout_is_below_default_redelivery() {
        let defaults = PipelineConfig::default();
        assert!(defaults.dispatcher.send_timeout < defaults.bus.redelivery_timeout);
    }

    #[test]
    fn shutdown_grace_is_merged_and_validated() {
        let loaded = load_str("[settlement]\nshutdown_grace_ms = 2500\n", None).unwrap();
        assert_eq!(
            loaded.pipeline.settlement.consumer.shutdown_grace,
            Duration::from_millis(2500)
        );
        let err = load_str("[notification]\nshutdown_grace_ms = 0\n", None).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("shutdown_grace")));
    }

    #[test]
    fn zero_capture_window_is_rejected() {
        assert!(load_str("[capture]\nwindow_secs = 0\n", None).is_err());
    }
}
