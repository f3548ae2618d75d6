//! Wrapper lifecycle telemetry.
//!
//! Every construction, observer (un)registration and teardown step is
//! published on a broadcast channel so hosts and tests can watch the
//! ordering of a wrapper's life.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::native::NativeId;

/// Lifecycle step of a wrapper object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEventKind {
    WrapperCreated,
    ObserverRegistered,
    ObserverUnregistered,
    DispatchDetached,
    FactoryReleased,
    WrapperDestroyed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub timestamp_ms: u64,
    pub class: String,
    pub native_id: NativeId,
    pub kind: LifecycleEventKind,
}

#[derive(Clone)]
pub struct LifecycleTelemetry {
    tx: broadcast::Sender<LifecycleEvent>,
    started: Instant,
}

impl LifecycleTelemetry {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            started: Instant::now(),
        }
    }

    pub fn publish(&self, class: &str, native_id: NativeId, kind: LifecycleEventKind) {
        let event = LifecycleEvent {
            timestamp_ms: self.started.elapsed().as_millis() as u64,
            class: class.to_string(),
            native_id,
            kind,
        };
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

impl Default for LifecycleTelemetry {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_subscribers() {
        let telemetry = LifecycleTelemetry::default();
        let mut rx = telemetry.subscribe();

        telemetry.publish("RTCDTMFSender", 7, LifecycleEventKind::WrapperCreated);
        telemetry.publish("RTCDTMFSender", 7, LifecycleEventKind::WrapperDestroyed);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, LifecycleEventKind::WrapperCreated);
        assert_eq!(first.native_id, 7);
        assert_eq!(
            rx.try_recv().unwrap().kind,
            LifecycleEventKind::WrapperDestroyed
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let telemetry = LifecycleTelemetry::new(4);
        telemetry.publish("RTCDTMFSender", 1, LifecycleEventKind::FactoryReleased);
    }
}
