//! Object store implementations

mod memory;

pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use blobwatch_core::types::{ObjectMetadata, ObjectPage, ObjectReference};
use blobwatch_core::utils::{validate_container_name, validate_object_path};
use blobwatch_core::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Object store trait
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of a container in path order, resuming after `continuation`
    async fn list(
        &self,
        container: &str,
        continuation: Option<&str>,
        page_size: usize,
    ) -> Result<ObjectPage>;

    /// Read object properties, including its current version tag
    async fn head(&self, container: &str, path: &str) -> Result<ObjectMetadata>;

    /// Read object content together with the properties of the version read
    async fn get(&self, container: &str, path: &str) -> Result<(ObjectMetadata, Bytes)>;

    /// Store object content, returning the new version
    async fn put(&self, container: &str, path: &str, data: Bytes) -> Result<ObjectReference>;

    /// Delete object
    async fn delete(&self, container: &str, path: &str) -> Result<()>;

    /// Create container if missing
    async fn create_container(&self, container: &str) -> Result<()>;
}

/// Local filesystem object store
///
/// Containers are directories below `data_dir` and objects keep their paths,
/// so files dropped into a container directory by other tools are discovered
/// as well. The version tag is derived from size and modification time.
pub struct LocalObjectStore {
    data_dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;
        info!("Object store initialized at {:?}", self.data_dir);
        Ok(())
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.data_dir.join(container)
    }

    fn object_path(&self, container: &str, path: &str) -> PathBuf {
        self.container_path(container).join(path)
    }

    async fn metadata_for(
        &self,
        container: &str,
        path: &str,
        file: &Path,
    ) -> Result<ObjectMetadata> {
        let meta = match fs::metadata(file).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(Error::no_such_object(container, path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::no_such_object(container, path))
            }
            Err(e) => return Err(e.into()),
        };

        let modified = meta.modified()?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        Ok(ObjectMetadata {
            reference: ObjectReference::new(container, path, version_tag(meta.len(), nanos)),
            size: meta.len(),
            last_modified: DateTime::<Utc>::from(modified),
        })
    }

    /// Relative paths of every file in a container, sorted
    async fn walk(&self, container: &str) -> Result<Vec<String>> {
        let root = self.container_path(container);
        if !fs::try_exists(&root).await? {
            return Err(Error::NoSuchContainer(container.to_string()));
        }

        let mut paths = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&root) {
                        let relative = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        paths.push(relative);
                    }
                }
            }
        }

        paths.sort();
        Ok(paths)
    }
}

fn version_tag(size: u64, modified_nanos: u128) -> String {
    let mut hasher = Md5::new();
    hasher.update(size.to_be_bytes());
    hasher.update(modified_nanos.to_be_bytes());
    format!("0x{}", hex::encode_upper(&hasher.finalize()[..8]))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(
        &self,
        container: &str,
        continuation: Option<&str>,
        page_size: usize,
    ) -> Result<ObjectPage> {
        let paths = self.walk(container).await?;
        let start = match continuation {
            Some(after) => paths.partition_point(|p| p.as_str() <= after),
            None => 0,
        };
        let end = (start + page_size.max(1)).min(paths.len());

        let mut objects = Vec::with_capacity(end - start);
        for path in &paths[start..end] {
            let file = self.object_path(container, path);
            match self.metadata_for(container, path, &file).await {
                Ok(meta) => objects.push(meta),
                // Removed between walk and stat
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        let continuation = if end < paths.len() {
            paths.get(end - 1).cloned()
        } else {
            None
        };

        debug!(
            "Listed {} objects in {} (more: {})",
            objects.len(),
            container,
            continuation.is_some()
        );
        Ok(ObjectPage {
            objects,
            continuation,
        })
    }

    async fn head(&self, container: &str, path: &str) -> Result<ObjectMetadata> {
        validate_object_path(path)?;
        let file = self.object_path(container, path);
        self.metadata_for(container, path, &file).await
    }

    async fn get(&self, container: &str, path: &str) -> Result<(ObjectMetadata, Bytes)> {
        validate_object_path(path)?;
        let file = self.object_path(container, path);
        let meta = self.metadata_for(container, path, &file).await?;

        let data = match fs::read(&file).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::no_such_object(container, path))
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Retrieved object {}/{} ({} bytes)", container, path, data.len());

        Ok((meta, Bytes::from(data)))
    }

    async fn put(&self, container: &str, path: &str, data: Bytes) -> Result<ObjectReference> {
        validate_container_name(container)?;
        validate_object_path(path)?;
        let file = self.object_path(container, path);

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut handle = fs::File::create(&file).await?;
        handle.write_all(&data).await?;
        handle.sync_all().await?;

        debug!("Stored object {}/{} ({} bytes)", container, path, data.len());
        Ok(self.metadata_for(container, path, &file).await?.reference)
    }

    async fn delete(&self, container: &str, path: &str) -> Result<()> {
        validate_object_path(path)?;
        let file = self.object_path(container, path);

        match fs::remove_file(&file).await {
            Ok(()) => {
                debug!("Deleted object {}/{}", container, path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        validate_container_name(container)?;
        fs::create_dir_all(self.container_path(container)).await?;
        info!("Created container {}", container);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_put_list_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.init().await.unwrap();
        store.create_container("input").await.unwrap();

        let a = store
            .put("input", "a.txt", Bytes::from_static(b"alpha"))
            .await
            .unwrap();
        store
            .put("input", "nested/b.txt", Bytes::from_static(b"beta"))
            .await
            .unwrap();

        let page = store.list("input", None, 10).await.unwrap();
        let paths: Vec<_> = page.objects.iter().map(|o| o.reference.path.clone()).collect();
        assert_eq!(paths, vec!["a.txt", "nested/b.txt"]);
        assert!(page.is_last());

        let (meta, data) = store.get("input", "a.txt").await.unwrap();
        assert_eq!(meta.reference, a);
        assert_eq!(&data[..], b"alpha");
        assert_eq!(store.head("input", "a.txt").await.unwrap().size, 5);
    }

    #[tokio::test]
    async fn test_local_store_pagination() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        for i in 0..5 {
            store
                .put("input", &format!("f{}.txt", i), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let first = store.list("input", None, 2).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.continuation.as_deref(), Some("f1.txt"));

        let second = store
            .list("input", first.continuation.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.objects[0].reference.path, "f2.txt");

        let last = store
            .list("input", second.continuation.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(last.objects.len(), 1);
        assert!(last.is_last());
    }

    #[tokio::test]
    async fn test_local_store_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.create_container("input").await.unwrap();

        assert!(store.head("input", "nope.txt").await.unwrap_err().is_not_found());
        assert!(matches!(
            store.list("absent", None, 10).await,
            Err(Error::NoSuchContainer(_))
        ));
        store.delete("input", "nope.txt").await.unwrap();
    }
}
