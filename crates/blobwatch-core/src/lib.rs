//! Blobwatch Core Library
//!
//! Core types, errors, configuration and helpers shared by the blob trigger
//! pipeline: object references, receipts, trigger messages and path patterns.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::BlobwatchConfig;
pub use error::{Error, Result};

/// Blobwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Message type tag written into every trigger message
pub const BLOB_TRIGGER_MESSAGE_TYPE: &str = "BlobTrigger";

/// Prefix of the per-host trigger queue name
pub const TRIGGER_QUEUE_PREFIX: &str = "blobwatch-trigger-";

/// Suffix appended to a queue name to form its dead-letter queue
pub const DEAD_LETTER_SUFFIX: &str = "-poison";

/// Maximum container name length
pub const MAX_CONTAINER_NAME_LENGTH: usize = 63;

/// Minimum container name length
pub const MIN_CONTAINER_NAME_LENGTH: usize = 3;

/// Maximum object path length
pub const MAX_PATH_LENGTH: usize = 1024;

/// Maximum queue name length
pub const MAX_QUEUE_NAME_LENGTH: usize = 63;
