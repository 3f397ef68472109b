//! In-memory queue with visibility timeouts and dead-lettering

use async_trait::async_trait;
use blobwatch_core::types::QueueMessage;
use blobwatch_core::utils::{dead_letter_queue_name, generate_message_id, validate_queue_name};
use blobwatch_core::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{QueueClient, TriggerQueue};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
    delivery_count: u32,
    inserted_at: DateTime<Utc>,
    visible_at: Instant,
    pop_receipt: Option<String>,
}

#[derive(Default)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    enqueue_failures: u32,
    delete_failures: u32,
    enqueued_total: u64,
}

/// Queue kept in process memory
pub struct MemoryQueue {
    name: String,
    max_delivery_count: u32,
    dead_letter: Option<Arc<MemoryQueue>>,
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, max_delivery_count: u32) -> Self {
        Self {
            name: name.into(),
            max_delivery_count: max_delivery_count.max(1),
            dead_letter: None,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Route messages exceeding the delivery threshold to `queue`
    pub fn with_dead_letter(mut self, queue: Arc<MemoryQueue>) -> Self {
        self.dead_letter = Some(queue);
        self
    }

    pub fn max_delivery_count(&self) -> u32 {
        self.max_delivery_count
    }

    /// Fail the next `count` enqueues with a transient error
    pub fn fail_next_enqueues(&self, count: u32) {
        self.state.lock().enqueue_failures = count;
    }

    /// Fail the next `count` deletes with a transient error
    pub fn fail_next_deletes(&self, count: u32) {
        self.state.lock().delete_failures = count;
    }

    /// Bodies of every stored message in insertion order
    pub fn bodies(&self) -> Vec<String> {
        self.state
            .lock()
            .messages
            .iter()
            .map(|m| m.body.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Successful enqueues since creation
    pub fn enqueued_total(&self) -> u64 {
        self.state.lock().enqueued_total
    }

    /// Make every hidden message visible now, as if its timeout elapsed
    pub fn expire_visibility(&self) {
        let now = Instant::now();
        for message in self.state.lock().messages.iter_mut() {
            message.visible_at = now;
        }
    }

    fn push(&self, body: String) -> String {
        let id = generate_message_id();
        let mut state = self.state.lock();
        state.messages.push_back(StoredMessage {
            id: id.clone(),
            body,
            delivery_count: 0,
            inserted_at: Utc::now(),
            visible_at: Instant::now(),
            pop_receipt: None,
        });
        state.enqueued_total += 1;
        id
    }
}

#[async_trait]
impl TriggerQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, body: String) -> Result<String> {
        {
            let mut state = self.state.lock();
            if state.enqueue_failures > 0 {
                state.enqueue_failures -= 1;
                return Err(Error::ServiceUnavailable(format!(
                    "enqueue to {} timed out",
                    self.name
                )));
            }
        }

        let id = self.push(body);
        debug!("Enqueued message {} to {}", id, self.name);
        Ok(id)
    }

    async fn fetch(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let now = Instant::now();
        let next_visible_at = Utc::now()
            + chrono::Duration::from_std(visibility_timeout)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let mut fetched = Vec::new();
        let mut poisoned = Vec::new();

        {
            let mut state = self.state.lock();
            let mut index = 0;
            while index < state.messages.len() && fetched.len() < max_messages {
                let (visible_at, delivery_count) = {
                    let message = &state.messages[index];
                    (message.visible_at, message.delivery_count)
                };
                if visible_at > now {
                    index += 1;
                    continue;
                }

                if delivery_count >= self.max_delivery_count {
                    if let Some(message) = state.messages.remove(index) {
                        poisoned.push(message);
                    }
                    continue;
                }

                let message = &mut state.messages[index];
                let pop_receipt = generate_message_id();
                message.delivery_count += 1;
                message.visible_at = now + visibility_timeout;
                message.pop_receipt = Some(pop_receipt.clone());

                fetched.push(QueueMessage {
                    id: message.id.clone(),
                    pop_receipt,
                    body: message.body.clone(),
                    delivery_count: message.delivery_count,
                    inserted_at: message.inserted_at,
                    next_visible_at,
                });
                index += 1;
            }
        }

        for message in poisoned {
            warn!(
                "Message {} on {} exceeded {} deliveries, moving to dead-letter",
                message.id, self.name, self.max_delivery_count
            );
            match &self.dead_letter {
                Some(dead_letter) => {
                    dead_letter.push(message.body);
                }
                None => warn!("No dead-letter queue for {}, dropping {}", self.name, message.id),
            }
        }

        Ok(fetched)
    }

    async fn delete(&self, message_id: &str, pop_receipt: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.delete_failures > 0 {
            state.delete_failures -= 1;
            return Err(Error::ServiceUnavailable(format!(
                "delete from {} timed out",
                self.name
            )));
        }

        let position = state.messages.iter().position(|m| {
            m.id == message_id && m.pop_receipt.as_deref() == Some(pop_receipt)
        });
        match position {
            Some(index) => {
                state.messages.remove(index);
                Ok(())
            }
            None => Err(Error::NoSuchMessage(message_id.to_string())),
        }
    }

    async fn approximate_len(&self) -> Result<usize> {
        Ok(self.len())
    }
}

/// Creates memory queues on demand, each paired with a `-poison` dead-letter queue
pub struct MemoryQueueClient {
    max_delivery_count: u32,
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
}

impl MemoryQueueClient {
    pub fn new(max_delivery_count: u32) -> Self {
        Self {
            max_delivery_count,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Concrete handle to a queue, for inspection
    pub fn memory_queue(&self, name: &str) -> Result<Arc<MemoryQueue>> {
        validate_queue_name(name)?;
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get(name) {
            return Ok(Arc::clone(queue));
        }

        let dead_letter_name = dead_letter_queue_name(name);
        let dead_letter = Arc::clone(
            queues
                .entry(dead_letter_name.clone())
                .or_insert_with(|| Arc::new(MemoryQueue::new(dead_letter_name, u32::MAX))),
        );
        let queue = Arc::new(
            MemoryQueue::new(name, self.max_delivery_count).with_dead_letter(dead_letter),
        );
        queues.insert(name.to_string(), Arc::clone(&queue));
        Ok(queue)
    }
}

#[async_trait]
impl QueueClient for MemoryQueueClient {
    async fn queue(&self, name: &str) -> Result<Arc<dyn TriggerQueue>> {
        let queue: Arc<dyn TriggerQueue> = self.memory_queue(name)?;
        Ok(queue)
    }
}
