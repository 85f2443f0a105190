//! Fetch loop plus fixed worker pool shared by every bus consumer.
//!
//! One task fetches bounded batches and pushes each message onto a bounded
//! work queue. `workers` long-lived tasks drain the queue, buffer their
//! results, and flush them when a threshold is reached, when the flush timer
//! fires, or when the queue closes. Offsets are acknowledged only after the
//! flush that covers them succeeds.
//!
//! Shutdown waits `shutdown_grace` for the workers. Workers still busy after
//! that are aborted, and whatever they held stays unacknowledged.

use crate::bus::{BusMessage, EventBus, Subscription};
use crate::config::ConsumerConfig;
use crate::events::{work_queue, WorkQueueReceiver};
use crate::utils::shutdown::wait_for_shutdown;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Pause after a failed fetch before trying again.
const FETCH_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Per-worker message handling.
#[async_trait]
pub trait ConsumerWorker: Send + 'static {
    /// Process one message and buffer whatever must be written or acknowledged.
    async fn handle(&mut self, message: BusMessage);

    /// Whether the buffer has reached its flush threshold.
    fn should_flush(&self) -> bool;

    /// Write buffered results. Returns the offsets that are now safe to
    /// acknowledge; offsets left out are redelivered later.
    async fn flush(&mut self) -> Vec<u64>;
}

pub struct ConsumerPool {
    name: &'static str,
    bus: Arc<dyn EventBus>,
    subscription: Subscription,
    config: ConsumerConfig,
}

impl ConsumerPool {
    pub fn new(
        name: &'static str,
        bus: Arc<dyn EventBus>,
        topic: &str,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            name,
            bus,
            subscription: Subscription::new(topic, config.group.clone()),
            config,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Run until shutdown. Returns once every worker has drained the queue and
    /// done its final flush, or once `shutdown_grace` has run out.
    pub async fn run<W, F>(self, mut make_worker: F, mut shutdown_rx: watch::Receiver<bool>)
    where
        W: ConsumerWorker,
        F: FnMut(usize) -> W,
    {
        let name = self.name;
        info!(
            consumer = name,
            subscription = %self.subscription,
            workers = self.config.workers,
            "{name} started"
        );

        let (queue_tx, queue_rx) = work_queue(self.config.queue_capacity);
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers.max(1) {
            workers.spawn(run_worker(
                name,
                id,
                make_worker(id),
                queue_rx.clone(),
                self.bus.clone(),
                self.subscription.clone(),
                self.config.flush_interval,
            ));
        }
        drop(queue_rx);

        'fetch: loop {
            let fetched = tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!(consumer = name, "{name} received shutdown signal");
                    break 'fetch;
                }

                fetched = self.bus.fetch(
                    &self.subscription,
                    self.config.batch_size,
                    self.config.fetch_timeout,
                ) => fetched,
            };

            let messages = match fetched {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(consumer = name, error = %e, "Failed to fetch messages");
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown_rx) => break 'fetch,
                        _ = tokio::time::sleep(FETCH_ERROR_BACKOFF) => continue 'fetch,
                    }
                }
            };

            if !messages.is_empty() {
                debug!(consumer = name, count = messages.len(), "Fetched batch");
            }

            for message in messages {
                tokio::select! {
                    biased;

                    // Anything not yet queued stays unacknowledged and is
                    // redelivered after restart.
                    _ = wait_for_shutdown(&mut shutdown_rx) => {
                        info!(consumer = name, "{name} received shutdown signal");
                        break 'fetch;
                    }

                    sent = queue_tx.send(message) => {
                        if sent.is_err() {
                            error!(consumer = name, "Work queue closed unexpectedly");
                            break 'fetch;
                        }
                    }
                }
            }
        }

        // Closing the queue lets workers drain what is left and flush.
        drop(queue_tx);
        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!(consumer = name, error = %e, "Worker task failed");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                consumer = name,
                remaining = workers.len(),
                grace = ?self.config.shutdown_grace,
                "Workers did not drain in time, aborting; their messages stay unacknowledged"
            );
            workers.abort_all();
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Err(e) if !e.is_cancelled() => {
                        error!(consumer = name, error = %e, "Worker task failed");
                    }
                    _ => {}
                }
            }
        }

        info!(consumer = name, "{name} shutdown complete");
    }
}

async fn run_worker<W: ConsumerWorker>(
    name: &'static str,
    id: usize,
    mut worker: W,
    queue: WorkQueueReceiver,
    bus: Arc<dyn EventBus>,
    subscription: Subscription,
    flush_interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + flush_interval,
        flush_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = queue.recv() => {
                let Some(message) = message else {
                    break;
                };
                worker.handle(message).await;
                if worker.should_flush() {
                    flush_and_ack(name, id, &mut worker, bus.as_ref(), &subscription).await;
                }
            }

            _ = ticker.tick() => {
                flush_and_ack(name, id, &mut worker, bus.as_ref(), &subscription).await;
            }
        }
    }

    flush_and_ack(name, id, &mut worker, bus.as_ref(), &subscription).await;
    debug!(consumer = name, worker = id, "Worker stopped");
}

async fn flush_and_ack<W: ConsumerWorker>(
    name: &'static str,
    id: usize,
    worker: &mut W,
    bus: &dyn EventBus,
    subscription: &Subscription,
) {
    let offsets = worker.flush().await;
    if offsets.is_empty() {
        return;
    }
    match bus.ack(subscription, &offsets).await {
        Ok(()) => debug!(consumer = name, worker = id, count = offsets.len(), "Acknowledged"),
        Err(e) => warn!(
            consumer = name,
            worker = id,
            error = %e,
            "Failed to acknowledge; messages will be redelivered"
        ),
    }
}
