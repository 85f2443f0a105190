//! Work queue handed from a consumer's fetch loop to its worker pool.

use crate::bus::BusMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Default buffer size for a consumer's work queue.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender held by the fetch loop. Dropping it closes the queue.
pub type WorkQueueSender = mpsc::Sender<BusMessage>;

/// Receiver shared by all workers of one consumer; each message goes to
/// exactly one worker.
#[derive(Clone)]
pub struct WorkQueueReceiver {
    inner: Arc<Mutex<mpsc::Receiver<BusMessage>>>,
}

impl WorkQueueReceiver {
    /// Next message, or `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<BusMessage> {
        self.inner.lock().await.recv().await
    }
}

/// Create a bounded work queue. A full queue blocks the fetch loop, which is
/// the consumer's only admission control.
pub fn work_queue(capacity: usize) -> (WorkQueueSender, WorkQueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        WorkQueueReceiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}
