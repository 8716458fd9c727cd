//! Backup events and the bus that delivers them
//!
//! The backup service only produces events. Consumers subscribe on the
//! `EventBus` by topic; the bus also keeps a bounded history of what it
//! published.

mod bus;
mod event;
mod history;

pub use bus::{EventBus, EventHandler, SubscriptionId};
pub use event::{
    BackupEvent, TOPIC_ALL, TOPIC_COMPLETED, TOPIC_FAILED, TOPIC_FAILURE_ALERT,
    TOPIC_RETENTION_APPLIED,
};
pub use history::EventHistory;
