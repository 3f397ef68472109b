//! Fast-path notifications between pipeline stages

use std::collections::HashMap;
use std::sync::Arc;

use blobwatch_core::types::ObjectReference;
use parking_lot::RwLock;
use tokio::sync::Notify;

/// Told when a trigger message lands on a queue
pub trait MessageEnqueuedWatcher: Send + Sync {
    /// Must not block; repeated calls before the poller wakes coalesce
    fn notify(&self, queue_name: &str);
}

/// Told when a function wrote an object that may trigger other functions
pub trait BlobWrittenWatcher: Send + Sync {
    fn notify(&self, object: &ObjectReference);
}

/// Routes enqueue notifications to the pollers subscribed to each queue
#[derive(Default)]
pub struct SharedQueueWatcher {
    subscribers: RwLock<HashMap<String, Vec<Arc<Notify>>>>,
}

impl SharedQueueWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake-up handle fired whenever `queue_name` receives a message
    pub fn subscribe(&self, queue_name: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.subscribers
            .write()
            .entry(queue_name.to_string())
            .or_default()
            .push(Arc::clone(&notify));
        notify
    }
}

impl MessageEnqueuedWatcher for SharedQueueWatcher {
    fn notify(&self, queue_name: &str) {
        if let Some(subscribers) = self.subscribers.read().get(queue_name) {
            for subscriber in subscribers {
                // Stores a single permit when nobody waits, so bursts coalesce
                subscriber.notify_one();
            }
        }
    }
}
