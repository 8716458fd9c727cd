//! Publish/subscribe event bus
//!
//! Subscribers register per topic and run in registration order. Wildcard
//! subscribers run after the topic's own subscribers. A subscriber that
//! panics is logged and skipped; publishing never fails.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::event::{BackupEvent, TOPIC_ALL};
use super::history::EventHistory;

/// Callback invoked for each matching event
pub type EventHandler = Arc<dyn Fn(&BackupEvent) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    by_topic: HashMap<String, Vec<(SubscriptionId, EventHandler)>>,
}

/// Topic-based event bus with a bounded history of published events
pub struct EventBus {
    subscribers: Mutex<Subscribers>,
    history: Mutex<EventHistory<BackupEvent>>,
}

impl EventBus {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Subscribers::default()),
            history: Mutex::new(EventHistory::new(history_capacity)),
        }
    }

    /// Register `handler` for `topic` (or `*` for every topic)
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&BackupEvent) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.next_id += 1;
        let id = SubscriptionId(subscribers.next_id);
        subscribers
            .by_topic
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let mut removed = false;
        for handlers in subscribers.by_topic.values_mut() {
            let before = handlers.len();
            handlers.retain(|(existing, _)| *existing != id);
            removed |= handlers.len() != before;
        }
        subscribers.by_topic.retain(|_, handlers| !handlers.is_empty());
        removed
    }

    /// Deliver `event` to its topic's subscribers, then to wildcard subscribers
    pub fn publish(&self, event: &BackupEvent) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());

        // Handlers run outside the lock so they may publish or subscribe
        let handlers: Vec<EventHandler> = {
            let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            [event.topic(), TOPIC_ALL]
                .iter()
                .filter_map(|topic| subscribers.by_topic.get(*topic))
                .flatten()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(topic = event.topic(), owner = event.owner_id(), "event subscriber panicked");
            }
        }
    }

    /// Up to `count` most recently published events, oldest first
    pub fn recent(&self, count: usize) -> Vec<BackupEvent> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recent(count)
    }

    /// Number of events currently held in history
    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::{TOPIC_COMPLETED, TOPIC_FAILED};
    use crate::models::DatasetKind;

    fn completed(owner: &str) -> BackupEvent {
        BackupEvent::Completed {
            dataset: DatasetKind::PricingWorksheet,
            owner_id: owner.into(),
            backup_id: None,
            retained: 1,
            pruned: 0,
        }
    }

    fn recorder(bus: &EventBus, topic: &str, tag: &'static str, log: &Arc<Mutex<Vec<String>>>) {
        let log = Arc::clone(log);
        bus.subscribe(topic, move |event| {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", tag, event.owner_id()));
        });
    }

    #[test]
    fn test_delivery_order() {
        let bus = EventBus::new(10);
        let log = Arc::new(Mutex::new(Vec::new()));

        recorder(&bus, TOPIC_ALL, "any", &log);
        recorder(&bus, TOPIC_COMPLETED, "first", &log);
        recorder(&bus, TOPIC_COMPLETED, "second", &log);
        recorder(&bus, TOPIC_FAILED, "failed", &log);

        bus.publish(&completed("T-1"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:T-1", "second:T-1", "any:T-1"]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new(10);
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let id = bus.subscribe(TOPIC_COMPLETED, move |e| {
            log_clone.lock().unwrap().push(e.owner_id().to_string())
        });

        bus.publish(&completed("T-1"));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&completed("T-2"));

        assert_eq!(*log.lock().unwrap(), vec!["T-1"]);
    }

    #[test]
    fn test_panicking_subscriber_is_skipped() {
        let bus = EventBus::new(10);
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(TOPIC_COMPLETED, |_| panic!("subscriber bug"));
        recorder(&bus, TOPIC_COMPLETED, "after", &log);

        bus.publish(&completed("T-1"));
        assert_eq!(*log.lock().unwrap(), vec!["after:T-1"]);
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::new(2);
        for owner in ["a", "b", "c"] {
            bus.publish(&completed(owner));
        }

        let recent = bus.recent(10);
        assert_eq!(bus.history_len(), 2);
        assert_eq!(recent[0].owner_id(), "b");
        assert_eq!(recent[1].owner_id(), "c");

        bus.clear_history();
        assert_eq!(bus.history_len(), 0);
    }
}
