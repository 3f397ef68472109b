//! Trigger queue writer
//!
//! Serializes trigger messages onto the host queue, retrying transient
//! failures with exponential backoff, then wakes the queue poller.

use std::sync::Arc;
use std::time::Duration;

use blobwatch_core::config::QueueConfig;
use blobwatch_core::types::TriggerMessage;
use blobwatch_core::utils::exponential_backoff;
use blobwatch_storage::TriggerQueue;
use metrics::counter;
use tracing::{debug, warn};

use crate::error::{ListenerError, ListenerResult};
use crate::metrics::names;
use crate::watchers::MessageEnqueuedWatcher;

/// Retry policy for enqueues
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(5),
        }
    }
}

impl From<&QueueConfig> for WriterConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.enqueue_max_attempts,
            retry_base_delay: config.enqueue_retry_base_delay(),
            ..Self::default()
        }
    }
}

pub struct TriggerQueueWriter {
    queue: Arc<dyn TriggerQueue>,
    watcher: Option<Arc<dyn MessageEnqueuedWatcher>>,
    config: WriterConfig,
}

impl TriggerQueueWriter {
    pub fn new(
        queue: Arc<dyn TriggerQueue>,
        watcher: Option<Arc<dyn MessageEnqueuedWatcher>>,
        config: WriterConfig,
    ) -> Self {
        Self {
            queue,
            watcher,
            config,
        }
    }

    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    /// Enqueue `message`, returning the queue's message id
    pub async fn enqueue(&self, message: &TriggerMessage) -> ListenerResult<String> {
        let body = message.to_json()?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.queue.enqueue(body.clone()).await {
                Ok(id) => {
                    debug!(
                        "Enqueued trigger for {} on {} as {} (attempt {})",
                        message.object(),
                        self.queue.name(),
                        id,
                        attempts
                    );
                    if let Some(watcher) = &self.watcher {
                        watcher.notify(self.queue.name());
                    }
                    return Ok(id);
                }
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    warn!(
                        "Failed to enqueue trigger to {} (attempt {}): {}",
                        self.queue.name(),
                        attempts,
                        e
                    );
                    counter!(names::QUEUE_ENQUEUE_RETRIES_TOTAL).increment(1);
                    tokio::time::sleep(exponential_backoff(
                        self.config.retry_base_delay,
                        self.config.max_retry_delay,
                        attempts,
                    ))
                    .await;
                }
                Err(e) => {
                    return Err(ListenerError::EnqueueFailed {
                        queue: self.queue.name().to_string(),
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobwatch_core::types::ObjectReference;
    use blobwatch_storage::MemoryQueue;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingWatcher {
        seen: Mutex<Vec<String>>,
    }

    impl MessageEnqueuedWatcher for RecordingWatcher {
        fn notify(&self, queue_name: &str) {
            self.seen.lock().push(queue_name.to_string());
        }
    }

    fn fast() -> WriterConfig {
        WriterConfig {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(5),
        }
    }

    fn message() -> TriggerMessage {
        TriggerMessage::new("f", &ObjectReference::new("input", "a.txt", "v1"))
    }

    #[tokio::test]
    async fn test_enqueue_notifies_watcher() {
        let queue = Arc::new(MemoryQueue::new("jobs", 5));
        let watcher = Arc::new(RecordingWatcher::default());
        let writer = TriggerQueueWriter::new(queue.clone(), Some(watcher.clone()), fast());

        writer.enqueue(&message()).await.unwrap();

        assert_eq!(queue.len(), 1);
        let parsed = TriggerMessage::from_json(&queue.bodies()[0]).unwrap();
        assert_eq!(parsed.object(), ObjectReference::new("input", "a.txt", "v1"));
        assert_eq!(*watcher.seen.lock(), vec!["jobs".to_string()]);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let queue = Arc::new(MemoryQueue::new("jobs", 5));
        queue.fail_next_enqueues(2);
        let writer = TriggerQueueWriter::new(queue.clone(), None, fast());

        writer.enqueue(&message()).await.unwrap();
        assert_eq!(queue.enqueued_total(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let queue = Arc::new(MemoryQueue::new("jobs", 5));
        queue.fail_next_enqueues(3);
        let watcher = Arc::new(RecordingWatcher::default());
        let writer = TriggerQueueWriter::new(queue.clone(), Some(watcher.clone()), fast());

        match writer.enqueue(&message()).await {
            Err(ListenerError::EnqueueFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected enqueue failure, got {:?}", other),
        }
        assert!(queue.is_empty());
        assert!(watcher.seen.lock().is_empty());
    }
}
