//! Storage collaborators for Blobwatch
//!
//! The trigger pipeline talks to three external services, each behind a
//! trait so hosts can plug in real cloud clients:
//! - [`ObjectStore`]: list/head/get over containers of objects
//! - [`TriggerQueue`] / [`QueueClient`]: a durable queue with visibility
//!   timeouts, delivery counts and a dead-letter destination
//! - [`ReceiptStore`]: a key/value store with compare-and-swap writes
//!
//! In-memory implementations back tests and single-process hosts;
//! [`LocalObjectStore`] and [`FileReceiptStore`] persist to a directory.

pub mod engine;
pub mod queue;
pub mod receipts;

pub use engine::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use queue::{MemoryQueue, MemoryQueueClient, QueueClient, TriggerQueue};
pub use receipts::{FileReceiptStore, MemoryReceiptStore, ReceiptStore};
