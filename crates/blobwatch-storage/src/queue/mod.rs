//! Queue collaborators
//!
//! A trigger queue is an at-least-once queue: fetched messages become
//! invisible for a visibility timeout and reappear unless deleted with the
//! pop receipt of that delivery. Once a message has been delivered
//! `max_delivery_count` times, the queue moves it to its dead-letter queue
//! instead of handing it out again.

mod memory;

pub use memory::{MemoryQueue, MemoryQueueClient};

use async_trait::async_trait;
use blobwatch_core::types::QueueMessage;
use blobwatch_core::Result;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait TriggerQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Append a message, returning its id
    async fn enqueue(&self, body: String) -> Result<String>;

    /// Hand out up to `max_messages` visible messages, hiding them for `visibility_timeout`
    async fn fetch(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>>;

    /// Delete a message; fails if the pop receipt is no longer current
    async fn delete(&self, message_id: &str, pop_receipt: &str) -> Result<()>;

    /// Messages currently stored, visible or not
    async fn approximate_len(&self) -> Result<usize>;
}

/// Resolves queues by name, creating them on first use
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn queue(&self, name: &str) -> Result<Arc<dyn TriggerQueue>>;
}
