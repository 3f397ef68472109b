//! Configuration for Blobwatch

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::sanitize_host_id;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlobwatchConfig {
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub receipts: ReceiptConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BlobwatchConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InternalError(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::InternalError(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(id) = std::env::var("BLOBWATCH_HOST_ID") {
            config.host.host_id = sanitize_host_id(&id);
        }
        if let Ok(dir) = std::env::var("BLOBWATCH_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_parse("BLOBWATCH_POLL_INTERVAL_SECS") {
            config.discovery.poll_interval_secs = secs;
        }
        if let Some(n) = env_parse("BLOBWATCH_MAX_IN_FLIGHT") {
            config.queue.max_in_flight = n;
        }
        if let Some(n) = env_parse("BLOBWATCH_MAX_DELIVERY_COUNT") {
            config.queue.max_delivery_count = n;
        }
        if let Ok(level) = std::env::var("BLOBWATCH_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("BLOBWATCH_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.host.host_id.is_empty() {
            return Err(crate::Error::InvalidArgument("host_id must not be empty".into()));
        }
        crate::utils::validate_queue_name(&self.host.trigger_queue_name())?;
        self.discovery.validate()?;
        self.queue.validate()?;
        Ok(())
    }
}

/// Parse an environment variable, ignoring it with a warning if malformed
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}

/// Host identity; scopes receipts and the trigger queue name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub host_id: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        let raw = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "blobwatch-host".to_string());
        let host_id = sanitize_host_id(&raw);
        Self {
            host_id: if host_id.is_empty() {
                "blobwatch-host".to_string()
            } else {
                host_id
            },
        }
    }
}

impl HostConfig {
    pub fn trigger_queue_name(&self) -> String {
        crate::utils::host_trigger_queue_name(&self.host_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the local object store; containers are subdirectories
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/data/blobwatch"),
        }
    }
}

/// Discovery poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Interval between listing cycles
    pub poll_interval_secs: u64,
    /// First backoff step after a container listing failure
    pub initial_backoff_ms: u64,
    /// Backoff cap for a failing container
    pub max_backoff_secs: u64,
    /// Objects requested per listing page
    pub page_size: usize,
    /// Pages processed per container per cycle before resuming next cycle
    pub max_pages_per_cycle: usize,
    /// Concurrent handler evaluations within one page
    pub evaluation_concurrency: usize,
    /// Purge expired receipts this often; disabled when unset
    pub receipt_gc_interval_secs: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            initial_backoff_ms: 1000,
            max_backoff_secs: 300,
            page_size: 1000,
            max_pages_per_cycle: 10,
            evaluation_concurrency: 16,
            receipt_gc_interval_secs: None,
        }
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn receipt_gc_interval(&self) -> Option<Duration> {
        self.receipt_gc_interval_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::InvalidArgument(
                "discovery.poll_interval_secs must be greater than zero".into(),
            ));
        }
        if self.page_size == 0 || self.max_pages_per_cycle == 0 || self.evaluation_concurrency == 0
        {
            return Err(crate::Error::InvalidArgument(
                "discovery page_size, max_pages_per_cycle and evaluation_concurrency must be positive"
                    .into(),
            ));
        }
        Ok(())
    }
}

/// Queue poller and trigger queue writer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Messages requested per fetch
    pub batch_size: usize,
    /// Messages processed concurrently
    pub max_in_flight: usize,
    /// How long a fetched message stays invisible to other consumers
    pub visibility_timeout_secs: u64,
    /// Delay after an empty fetch; doubles up to the maximum
    pub min_poll_interval_ms: u64,
    pub max_poll_interval_secs: u64,
    /// Deliveries before the queue moves a message to its dead-letter queue
    pub max_delivery_count: u32,
    /// Attempts for a single enqueue before giving up
    pub enqueue_max_attempts: u32,
    pub enqueue_retry_base_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            max_in_flight: 32,
            visibility_timeout_secs: 600,
            min_poll_interval_ms: 100,
            max_poll_interval_secs: 60,
            max_delivery_count: 5,
            enqueue_max_attempts: 3,
            enqueue_retry_base_delay_ms: 100,
        }
    }
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_millis(self.min_poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_secs(self.max_poll_interval_secs)
    }

    pub fn enqueue_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.enqueue_retry_base_delay_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 || self.max_in_flight == 0 {
            return Err(crate::Error::InvalidArgument(
                "queue.batch_size and queue.max_in_flight must be positive".into(),
            ));
        }
        if self.max_delivery_count == 0 {
            return Err(crate::Error::InvalidArgument(
                "queue.max_delivery_count must be positive".into(),
            ));
        }
        if self.enqueue_max_attempts == 0 {
            return Err(crate::Error::InvalidArgument(
                "queue.enqueue_max_attempts must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptConfig {
    /// Lifetime of a receipt; receipts never expire when unset
    pub ttl_secs: Option<u64>,
}

impl ReceiptConfig {
    pub fn ttl(&self) -> Option<chrono::Duration> {
        self.ttl_secs.map(|s| chrono::Duration::seconds(s as i64))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let mut config = BlobwatchConfig::default();
        config.host.host_id = "worker-1".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.host.trigger_queue_name(), "blobwatch-trigger-worker-1");
        assert_eq!(config.discovery.poll_interval(), Duration::from_secs(10));
        assert!(config.receipts.ttl().is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = BlobwatchConfig::from_toml(
            r#"
            [host]
            host_id = "edge-2"

            [discovery]
            poll_interval_secs = 30
            receipt_gc_interval_secs = 3600

            [queue]
            max_delivery_count = 3

            [receipts]
            ttl_secs = 86400
            "#,
        )
        .unwrap();

        assert_eq!(config.host.host_id, "edge-2");
        assert_eq!(config.discovery.poll_interval_secs, 30);
        assert_eq!(config.discovery.page_size, 1000);
        assert_eq!(
            config.discovery.receipt_gc_interval(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(config.queue.max_delivery_count, 3);
        assert_eq!(config.queue.batch_size, 16);
        assert_eq!(config.receipts.ttl(), Some(chrono::Duration::days(1)));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_storage_table_uses_defaults() {
        let config = BlobwatchConfig::from_toml(
            r#"
            [storage]

            [host]
            host_id = "edge-3"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("/data/blobwatch"));
        assert_eq!(config.host.host_id, "edge-3");
    }

    #[test]
    fn test_invalid_queue_settings() {
        let mut config = BlobwatchConfig::default();
        config.host.host_id = "worker-1".to_string();
        config.queue.max_in_flight = 0;
        assert!(config.validate().is_err());
    }
}
