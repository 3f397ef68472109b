//! Receipt store trait
//!
//! Defines the compare-and-swap key/value interface used for blob receipts.
//! Every successful write assigns a new record version; conditional writes
//! and deletes fail with `Error::PreconditionFailed` when the stored version
//! moved, so racing writers produce exactly one winner.

mod file;
mod memory;

pub use file::FileReceiptStore;
pub use memory::MemoryReceiptStore;

use async_trait::async_trait;
use blobwatch_core::types::{Receipt, ReceiptRecord, WriteCondition};
use blobwatch_core::Result;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ReceiptRecord>>;

    /// Conditionally write a receipt, returning the new record version
    async fn put(&self, key: &str, receipt: &Receipt, condition: WriteCondition) -> Result<u64>;

    /// Delete a receipt only if it still has the given record version
    async fn delete(&self, key: &str, version: u64) -> Result<()>;

    /// Remove receipts that expired at or before `now`, returning how many went
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
