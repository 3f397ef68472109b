//! In-memory receipt store

use async_trait::async_trait;
use blobwatch_core::types::{Receipt, ReceiptRecord, WriteCondition};
use blobwatch_core::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::ReceiptStore;

#[derive(Default)]
pub struct MemoryReceiptStore {
    records: Mutex<HashMap<String, ReceiptRecord>>,
    // Shared across keys so a recreated receipt never reuses an old version
    next_version: AtomicU64,
    delete_failures: AtomicU32,
}

impl MemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored receipt, keyed by receipt key
    pub fn snapshot(&self) -> HashMap<String, Receipt> {
        self.records
            .lock()
            .iter()
            .map(|(key, record)| (key.clone(), record.receipt.clone()))
            .collect()
    }

    /// Fail the next `count` deletes with a transient error
    pub fn fail_next_deletes(&self, count: u32) {
        self.delete_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReceiptStore for MemoryReceiptStore {
    async fn get(&self, key: &str) -> Result<Option<ReceiptRecord>> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, receipt: &Receipt, condition: WriteCondition) -> Result<u64> {
        let mut records = self.records.lock();
        let current = records.get(key).map(|r| r.version);

        match (condition, current) {
            (WriteCondition::IfAbsent, None) => {}
            (WriteCondition::IfVersion(expected), Some(actual)) if expected == actual => {}
            (WriteCondition::IfAbsent, Some(_)) => {
                return Err(Error::PreconditionFailed(format!(
                    "receipt {} already exists",
                    key
                )))
            }
            (WriteCondition::IfVersion(expected), _) => {
                return Err(Error::PreconditionFailed(format!(
                    "receipt {} is not at version {}",
                    key, expected
                )))
            }
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        records.insert(
            key.to_string(),
            ReceiptRecord {
                receipt: receipt.clone(),
                version,
            },
        );
        Ok(version)
    }

    async fn delete(&self, key: &str, version: u64) -> Result<()> {
        let pending = self.delete_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.delete_failures.store(pending - 1, Ordering::SeqCst);
            return Err(Error::ServiceUnavailable(format!(
                "delete of receipt {} timed out",
                key
            )));
        }

        let mut records = self.records.lock();
        match records.get(key) {
            Some(record) if record.version == version => {
                records.remove(key);
                Ok(())
            }
            _ => Err(Error::PreconditionFailed(format!(
                "receipt {} is not at version {}",
                key, version
            ))),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !record.receipt.is_expired(now));
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobwatch_core::types::ObjectReference;

    fn receipt(version_tag: &str) -> Receipt {
        Receipt::new("f", &ObjectReference::new("input", "a.txt", version_tag))
    }

    #[tokio::test]
    async fn test_create_if_absent_has_one_winner() {
        let store = MemoryReceiptStore::new();
        let first = store.put("k", &receipt("v1"), WriteCondition::IfAbsent).await;
        let second = store.put("k", &receipt("v1"), WriteCondition::IfAbsent).await;

        assert!(first.is_ok());
        assert!(second.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_update_requires_current_version() {
        let store = MemoryReceiptStore::new();
        let v = store
            .put("k", &receipt("v1"), WriteCondition::IfAbsent)
            .await
            .unwrap();
        let v2 = store
            .put("k", &receipt("v2"), WriteCondition::IfVersion(v))
            .await
            .unwrap();
        assert!(v2 > v);

        assert!(store
            .put("k", &receipt("v3"), WriteCondition::IfVersion(v))
            .await
            .unwrap_err()
            .is_conflict());
        assert!(store
            .put("missing", &receipt("v1"), WriteCondition::IfVersion(v))
            .await
            .unwrap_err()
            .is_conflict());

        let stored = store.get("k").await.unwrap().unwrap();
        assert_eq!(stored.receipt.version_tag, "v2");
        assert_eq!(stored.version, v2);
    }

    #[tokio::test]
    async fn test_conditional_delete_and_purge() {
        let store = MemoryReceiptStore::new();
        let v = store
            .put("k", &receipt("v1"), WriteCondition::IfAbsent)
            .await
            .unwrap();
        assert!(store.delete("k", v + 100).await.unwrap_err().is_conflict());
        store.delete("k", v).await.unwrap();
        assert!(store.is_empty());

        let expiring = receipt("v1").with_ttl(Some(chrono::Duration::seconds(1)));
        store
            .put("old", &expiring, WriteCondition::IfAbsent)
            .await
            .unwrap();
        store
            .put("keep", &receipt("v1"), WriteCondition::IfAbsent)
            .await
            .unwrap();

        let purged = store
            .purge_expired(Utc::now() + chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.get("keep").await.unwrap().is_some());
    }
}
