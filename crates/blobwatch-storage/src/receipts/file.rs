//! Directory-backed receipt store
//!
//! One JSON document per receipt, named by the MD5 of its key. Conditional
//! writes are serialized through a process-wide lock, so the store is only
//! safe for a single host process per directory.

use async_trait::async_trait;
use blobwatch_core::types::{Receipt, ReceiptRecord, WriteCondition};
use blobwatch_core::{Error, Result};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct StoredReceipt {
    key: String,
    version: u64,
    receipt: Receipt,
}

pub struct FileReceiptStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    next_version: AtomicU64,
}

impl FileReceiptStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        // Seeded from the clock so versions keep increasing across restarts
        let seed = Utc::now().timestamp_micros().max(0) as u64;
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            next_version: AtomicU64::new(seed),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        info!("Receipt store initialized at {:?}", self.dir);
        Ok(())
    }

    fn record_path(&self, key: &str) -> PathBuf {
        let mut hasher = Md5::new();
        hasher.update(key.as_bytes());
        self.dir
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    async fn read(&self, key: &str) -> Result<Option<StoredReceipt>> {
        match fs::read(self.record_path(key)).await {
            Ok(data) => {
                let stored: StoredReceipt = serde_json::from_slice(&data)?;
                Ok(Some(stored))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, stored: &StoredReceipt) -> Result<()> {
        let path = self.record_path(&stored.key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(stored)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl super::ReceiptStore for FileReceiptStore {
    async fn get(&self, key: &str) -> Result<Option<ReceiptRecord>> {
        Ok(self.read(key).await?.map(|stored| ReceiptRecord {
            receipt: stored.receipt,
            version: stored.version,
        }))
    }

    async fn put(&self, key: &str, receipt: &Receipt, condition: WriteCondition) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let current = self.read(key).await?.map(|stored| stored.version);

        let allowed = match (condition, current) {
            (WriteCondition::IfAbsent, None) => true,
            (WriteCondition::IfVersion(expected), Some(actual)) => expected == actual,
            _ => false,
        };
        if !allowed {
            return Err(Error::PreconditionFailed(format!(
                "receipt {} changed ({:?} vs {:?})",
                key, condition, current
            )));
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        self.write(&StoredReceipt {
            key: key.to_string(),
            version,
            receipt: receipt.clone(),
        })
        .await?;

        debug!("Wrote receipt {} at version {}", key, version);
        Ok(version)
    }

    async fn delete(&self, key: &str, version: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match self.read(key).await? {
            Some(stored) if stored.version == version => {
                fs::remove_file(self.record_path(key)).await?;
                Ok(())
            }
            _ => Err(Error::PreconditionFailed(format!(
                "receipt {} is not at version {}",
                key, version
            ))),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut purged = 0;
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stored: StoredReceipt = match fs::read(&path).await {
                Ok(data) => match serde_json::from_slice(&data) {
                    Ok(stored) => stored,
                    Err(e) => {
                        warn!("Skipping unreadable receipt {:?}: {}", path, e);
                        continue;
                    }
                },
                Err(e) => {
                    warn!("Skipping unreadable receipt {:?}: {}", path, e);
                    continue;
                }
            };
            if stored.receipt.is_expired(now) {
                fs::remove_file(&path).await?;
                purged += 1;
            }
        }

        Ok(purged)
    }
}
