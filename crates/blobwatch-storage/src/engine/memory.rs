//! In-memory object store

use async_trait::async_trait;
use blobwatch_core::types::{ObjectMetadata, ObjectPage, ObjectReference};
use blobwatch_core::utils::{validate_container_name, validate_object_path};
use blobwatch_core::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ObjectStore;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version_tag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn metadata(&self, container: &str, path: &str) -> ObjectMetadata {
        ObjectMetadata {
            reference: ObjectReference::new(container, path, &self.version_tag),
            size: self.data.len() as u64,
            last_modified: self.last_modified,
        }
    }
}

/// Object store kept in process memory
///
/// Version tags are `0x`-prefixed hex counters, unique across the store.
/// Listing failures and latency can be injected per container to exercise
/// retry and cancellation paths.
#[derive(Default)]
pub struct MemoryObjectStore {
    containers: RwLock<BTreeMap<String, BTreeMap<String, StoredObject>>>,
    next_version: AtomicU64,
    list_failures: RwLock<HashMap<String, u32>>,
    list_calls: RwLock<HashMap<String, u64>>,
    read_failures: RwLock<HashMap<String, u32>>,
    list_delay: RwLock<Option<Duration>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` listings of a container with a transient error
    pub fn fail_next_lists(&self, container: &str, count: u32) {
        self.list_failures.write().insert(container.to_string(), count);
    }

    /// Fail the next `count` head or get calls for `container/path` with a transient error
    pub fn fail_next_reads(&self, container: &str, path: &str, count: u32) {
        self.read_failures
            .write()
            .insert(format!("{}/{}", container, path), count);
    }

    /// Sleep this long inside every listing call
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        *self.list_delay.write() = delay;
    }

    /// Number of listing calls made against a container
    pub fn list_calls(&self, container: &str) -> u64 {
        self.list_calls.read().get(container).copied().unwrap_or(0)
    }

    pub fn object_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .get(container)
            .map_or(0, |objects| objects.len())
    }

    fn next_version_tag(&self) -> String {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        format!("0x{:016X}", version)
    }

    fn take_failure(map: &RwLock<HashMap<String, u32>>, key: &str) -> bool {
        let mut failures = map.write();
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(
        &self,
        container: &str,
        continuation: Option<&str>,
        page_size: usize,
    ) -> Result<ObjectPage> {
        *self
            .list_calls
            .write()
            .entry(container.to_string())
            .or_default() += 1;

        let delay = *self.list_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if Self::take_failure(&self.list_failures, container) {
            return Err(Error::ServiceUnavailable(format!(
                "listing {} throttled",
                container
            )));
        }

        let containers = self.containers.read();
        let objects = containers
            .get(container)
            .ok_or_else(|| Error::NoSuchContainer(container.to_string()))?;

        let lower = match continuation {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Unbounded,
        };
        let mut remaining = objects.range((lower, Bound::Unbounded));
        let page: Vec<ObjectMetadata> = remaining
            .by_ref()
            .take(page_size.max(1))
            .map(|(path, stored)| stored.metadata(container, path))
            .collect();

        let continuation = if remaining.next().is_some() {
            page.last().map(|m| m.reference.path.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects: page,
            continuation,
        })
    }

    async fn head(&self, container: &str, path: &str) -> Result<ObjectMetadata> {
        if Self::take_failure(&self.read_failures, &format!("{}/{}", container, path)) {
            return Err(Error::ServiceUnavailable(format!(
                "head {}/{} timed out",
                container, path
            )));
        }

        self.containers
            .read()
            .get(container)
            .and_then(|objects| objects.get(path))
            .map(|stored| stored.metadata(container, path))
            .ok_or_else(|| Error::no_such_object(container, path))
    }

    async fn get(&self, container: &str, path: &str) -> Result<(ObjectMetadata, Bytes)> {
        if Self::take_failure(&self.read_failures, &format!("{}/{}", container, path)) {
            return Err(Error::ServiceUnavailable(format!(
                "get {}/{} timed out",
                container, path
            )));
        }

        self.containers
            .read()
            .get(container)
            .and_then(|objects| objects.get(path))
            .map(|stored| (stored.metadata(container, path), stored.data.clone()))
            .ok_or_else(|| Error::no_such_object(container, path))
    }

    async fn put(&self, container: &str, path: &str, data: Bytes) -> Result<ObjectReference> {
        validate_container_name(container)?;
        validate_object_path(path)?;

        let stored = StoredObject {
            data,
            version_tag: self.next_version_tag(),
            last_modified: Utc::now(),
        };
        let reference = ObjectReference::new(container, path, &stored.version_tag);

        self.containers
            .write()
            .entry(container.to_string())
            .or_default()
            .insert(path.to_string(), stored);

        Ok(reference)
    }

    async fn delete(&self, container: &str, path: &str) -> Result<()> {
        if let Some(objects) = self.containers.write().get_mut(container) {
            objects.remove(path);
        }
        Ok(())
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        validate_container_name(container)?;
        self.containers
            .write()
            .entry(container.to_string())
            .or_default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_versions_change_on_write() {
        let store = MemoryObjectStore::new();
        let v1 = store
            .put("input", "a.txt", Bytes::from_static(b"one"))
            .await
            .unwrap();
        let v2 = store
            .put("input", "a.txt", Bytes::from_static(b"two"))
            .await
            .unwrap();

        assert!(v1.same_object(&v2));
        assert_ne!(v1.version_tag, v2.version_tag);
        assert_eq!(store.head("input", "a.txt").await.unwrap().reference, v2);
        assert_eq!(store.object_count("input"), 1);
    }

    #[tokio::test]
    async fn test_listing_pages_and_failures() {
        let store = MemoryObjectStore::new();
        for name in ["a", "b", "c"] {
            store
                .put("input", name, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let page = store.list("input", None, 2).await.unwrap();
        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.continuation.as_deref(), Some("b"));

        let page = store.list("input", Some("b"), 2).await.unwrap();
        assert_eq!(page.objects.len(), 1);
        assert!(page.is_last());

        store.fail_next_lists("input", 1);
        assert!(store.list("input", None, 2).await.unwrap_err().is_transient());
        assert!(store.list("input", None, 2).await.is_ok());
        assert_eq!(store.list_calls("input"), 4);

        assert!(store.list("missing", None, 2).await.unwrap_err().is_not_found());
    }
}
