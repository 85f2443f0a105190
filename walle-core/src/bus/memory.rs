use super::{BusError, BusMessage, EventBus, OutboundMessage, Subscription};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// Default time a fetched message may stay unacknowledged before it is
/// handed out again.
pub const DEFAULT_REDELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// In-process bus with per-group cursors and redelivery of unacknowledged
/// messages.
///
/// Topics are created on first use. A group seen for the first time starts at
/// the oldest retained message. Once every known group has acknowledged a
/// prefix of the log, that prefix is dropped.
///
/// Nothing survives the process. Deposits lost with the bus are recovered
/// from the ledger by the outbox relay.
pub struct InMemoryBus {
    state: Mutex<HashMap<String, TopicLog>>,
    published: Notify,
    redelivery_timeout: Duration,
}

#[derive(Default)]
struct TopicLog {
    /// Offset of `messages[0]`.
    base: u64,
    messages: VecDeque<StoredMessage>,
    groups: HashMap<String, GroupCursor>,
}

impl TopicLog {
    fn end(&self) -> u64 {
        self.base + self.messages.len() as u64
    }

    /// Drop the prefix every group has acknowledged.
    fn trim(&mut self) {
        let Some(low) = self
            .groups
            .values()
            .map(|cursor| {
                cursor
                    .in_flight
                    .keys()
                    .next()
                    .copied()
                    .unwrap_or(cursor.next)
            })
            .min()
        else {
            return;
        };
        while self.base < low && self.messages.pop_front().is_some() {
            self.base += 1;
        }
    }
}

struct StoredMessage {
    key: String,
    payload: Bytes,
}

#[derive(Default)]
struct GroupCursor {
    next: u64,
    in_flight: BTreeMap<u64, InFlight>,
}

struct InFlight {
    deadline: Instant,
    deliveries: u32,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_REDELIVERY_TIMEOUT)
    }
}

impl InMemoryBus {
    pub fn new(redelivery_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            published: Notify::new(),
            redelivery_timeout,
        }
    }

    /// Every retained payload of `topic`, in offset order.
    #[cfg(test)]
    pub(crate) async fn published(&self, topic: &str) -> Vec<Bytes> {
        let state = self.state.lock().await;
        state
            .get(topic)
            .map(|log| log.messages.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of messages still held for `topic`.
    #[cfg(test)]
    pub(crate) async fn retained(&self, topic: &str) -> usize {
        let state = self.state.lock().await;
        state.get(topic).map(|log| log.messages.len()).unwrap_or_default()
    }

    /// Number of messages fetched by the group and not yet acknowledged.
    #[cfg(test)]
    pub(crate) async fn unacked(&self, subscription: &Subscription) -> usize {
        let state = self.state.lock().await;
        state
            .get(&subscription.topic)
            .and_then(|log| log.groups.get(&subscription.group))
            .map(|cursor| cursor.in_flight.len())
            .unwrap_or_default()
    }

    /// Hand out expired in-flight messages first, then unseen ones.
    fn take(
        log: &mut TopicLog,
        subscription: &Subscription,
        max: usize,
        now: Instant,
        redelivery_timeout: Duration,
    ) -> Vec<BusMessage> {
        let start = log.base;
        let end = log.end();
        let TopicLog {
            base,
            messages,
            groups,
        } = log;
        let cursor = groups
            .entry(subscription.group.clone())
            .or_insert_with(|| GroupCursor {
                next: start,
                in_flight: BTreeMap::new(),
            });
        let stored_at = |offset: u64| {
            offset
                .checked_sub(*base)
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| messages.get(index))
        };
        let mut batch = Vec::new();

        for (&offset, flight) in cursor.in_flight.iter_mut() {
            if batch.len() >= max {
                break;
            }
            if flight.deadline > now {
                continue;
            }
            let Some(stored) = stored_at(offset) else {
                continue;
            };
            flight.deadline = now + redelivery_timeout;
            flight.deliveries += 1;
            batch.push(BusMessage {
                topic: subscription.topic.clone(),
                offset,
                key: stored.key.clone(),
                payload: stored.payload.clone(),
                delivery: flight.deliveries,
            });
        }

        while batch.len() < max && cursor.next < end {
            let offset = cursor.next;
            let Some(stored) = stored_at(offset) else {
                break;
            };
            cursor.next += 1;
            cursor.in_flight.insert(
                offset,
                InFlight {
                    deadline: now + redelivery_timeout,
                    deliveries: 1,
                },
            );
            batch.push(BusMessage {
                topic: subscription.topic.clone(),
                offset,
                key: stored.key.clone(),
                payload: stored.payload.clone(),
                delivery: 1,
            });
        }

        batch
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, topic: &str, messages: Vec<OutboundMessage>) -> Result<(), BusError> {
        if messages.is_empty() {
            return Ok(());
        }
        {
            let mut state = self.state.lock().await;
            let log = state.entry(topic.to_string()).or_default();
            log.messages
                .extend(messages.into_iter().map(|m| StoredMessage {
                    key: m.key,
                    payload: m.payload,
                }));
        }
        self.published.notify_waiters();
        Ok(())
    }

    async fn fetch(
        &self,
        subscription: &Subscription,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<BusMessage>, BusError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let give_up_at = Instant::now() + wait;

        loop {
            // Register interest before inspecting the log so a publish that
            // lands in between still wakes us.
            let notified = self.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_redelivery = {
                let mut state = self.state.lock().await;
                let log = state.entry(subscription.topic.clone()).or_default();
                let batch = Self::take(
                    log,
                    subscription,
                    max,
                    Instant::now(),
                    self.redelivery_timeout,
                );
                if !batch.is_empty() {
                    return Ok(batch);
                }
                log.groups
                    .get(&subscription.group)
                    .and_then(|cursor| cursor.in_flight.values().map(|f| f.deadline).min())
            };

            if Instant::now() >= give_up_at {
                return Ok(Vec::new());
            }
            let wake_at = next_redelivery.map_or(give_up_at, |at| at.min(give_up_at));

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, subscription: &Subscription, offsets: &[u64]) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        if let Some(log) = state.get_mut(&subscription.topic) {
            if let Some(cursor) = log.groups.get_mut(&subscription.group) {
                for offset in offsets {
                    cursor.in_flight.remove(offset);
                }
            }
            log.trim();
        }
        Ok(())
    }
}
