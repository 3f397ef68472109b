//! Queue envelope types

use chrono::{DateTime, Utc};

/// A message as handed out by a queue fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    /// Handle proving ownership of this delivery; required for delete
    pub pop_receipt: String,
    pub body: String,
    /// Number of times this message has been handed out, this delivery included
    pub delivery_count: u32,
    pub inserted_at: DateTime<Utc>,
    pub next_visible_at: DateTime<Utc>,
}
