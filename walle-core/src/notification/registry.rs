use super::{ChannelKind, DispatchError, NotificationSender};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("channel already registered: {0}")]
    AlreadyRegistered(ChannelKind),
}

/// Channel kind to sender map. Read-only once dispatching starts.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    senders: HashMap<ChannelKind, Arc<dyn NotificationSender>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kind: ChannelKind,
        sender: Arc<dyn NotificationSender>,
    ) -> Result<(), RegistryError> {
        if self.senders.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.senders.insert(kind, sender);
        Ok(())
    }

    /// Look up the sender for a wire channel name.
    pub fn resolve(
        &self,
        channel: &str,
    ) -> Result<(ChannelKind, &Arc<dyn NotificationSender>), DispatchError> {
        channel
            .parse::<ChannelKind>()
            .ok()
            .and_then(|kind| self.senders.get(&kind).map(|sender| (kind, sender)))
            .ok_or_else(|| DispatchError::ChannelNotRegistered(channel.to_string()))
    }

    pub fn kinds(&self) -> Vec<ChannelKind> {
        let mut kinds: Vec<_> = self.senders.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::LogSender;

    fn log_sender(kind: ChannelKind) -> Arc<dyn NotificationSender> {
        Arc::new(LogSender::new(kind))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ChannelRegistry::new();
        registry
            .register(ChannelKind::Email, log_sender(ChannelKind::Email))
            .unwrap();
        let err = registry
            .register(ChannelKind::Email, log_sender(ChannelKind::Email))
            .unwrap_err();
        assert_eq!(err.to_string(), "channel already registered: email");
        assert_eq!(registry.kinds(), [ChannelKind::Email]);
    }

    #[test]
    fn resolve_unregistered_or_unknown_channel() {
        let mut registry = ChannelRegistry::new();
        registry
            .register(ChannelKind::Email, log_sender(ChannelKind::Email))
            .unwrap();

        let (kind, _) = registry.resolve("email").unwrap();
        assert_eq!(kind, ChannelKind::Email);

        let err = registry.resolve("sms").err().unwrap();
        assert_eq!(err.to_string(), "channel not registered: sms");

        let err = registry.resolve("carrier-pigeon").err().unwrap();
        assert_eq!(err.to_string(), "channel not registered: carrier-pigeon");
    }
}
