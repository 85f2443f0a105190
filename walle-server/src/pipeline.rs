//! Wiring of the background processors.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use walle_core::bus::EventBus;
use walle_core::config::{ChannelConfig, ChannelTarget, PipelineConfig};
use walle_core::events::EventProducer;
use walle_core::notification::{
    ChannelRegistry, HttpGatewaySender, LogSender, NotificationSender, RegistryError,
};
use walle_core::processors::{
    CaptureJob, CompletionConsumer, NotificationDispatcher, OutboxRelay, SettlementConsumer,
};
use walle_core::store::{BalanceStore, LedgerStore};

/// Build one sender per configured channel.
pub fn build_registry(
    channels: &[ChannelConfig],
    send_timeout: Duration,
) -> Result<ChannelRegistry, RegistryError> {
    let mut registry = ChannelRegistry::new();
    for channel in channels {
        let sender: Arc<dyn NotificationSender> = match &channel.target {
            ChannelTarget::Gateway(url) => Arc::new(HttpGatewaySender::new(
                channel.kind,
                url.clone(),
                send_timeout,
            )),
            ChannelTarget::Log => Arc::new(LogSender::new(channel.kind)),
        };
        registry.register(channel.kind, sender)?;
    }
    tracing::info!(channels = ?registry.kinds(), "Notification channels registered");
    Ok(registry)
}

/// Spawn every background processor. Each one exits once `shutdown_rx`
/// flips; await the returned handles to wait for them to drain.
pub fn spawn_pipeline(
    config: &PipelineConfig,
    bus: Arc<dyn EventBus>,
    ledger: Arc<dyn LedgerStore>,
    balances: Arc<dyn BalanceStore>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<()>>, RegistryError> {
    let registry = build_registry(&config.dispatcher.channels, config.dispatcher.send_timeout)?;
    let mut handles = Vec::new();

    let settlement =
        SettlementConsumer::new(bus.clone(), balances, config.settlement.clone());
    handles.push(tokio::spawn(settlement.run(shutdown_rx.clone())));

    let completion =
        CompletionConsumer::new(bus.clone(), ledger.clone(), config.completion.clone());
    handles.push(tokio::spawn(completion.run(shutdown_rx.clone())));

    let dispatcher = NotificationDispatcher::new(
        bus.clone(),
        registry,
        config.dispatcher.consumer.clone(),
    );
    handles.push(tokio::spawn(dispatcher.run(shutdown_rx.clone())));

    let relay = OutboxRelay::new(ledger.clone(), EventProducer::new(bus), config.outbox);
    handles.push(tokio::spawn(relay.run(shutdown_rx.clone())));

    match config.capture.interval {
        Some(interval) => {
            let capture = CaptureJob::new(ledger, config.capture);
            handles.push(tokio::spawn(capture.run(interval, shutdown_rx)));
        }
        None => {
            tracing::info!("In-process capture schedule disabled");
        }
    }

    Ok(handles)
}
