//! Receipt types
//!
//! A receipt records that a trigger message was produced for one version of
//! an object on behalf of one function. Receipts are written with optimistic
//! concurrency so that racing discovery passes produce at most one winner.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ObjectReference;

/// Idempotency record for a (function, object) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub function_id: String,
    pub container: String,
    pub path: String,
    /// Version tag of the object when the trigger message was produced
    pub version_tag: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Receipt {
    pub fn new(function_id: impl Into<String>, object: &ObjectReference) -> Self {
        Self {
            function_id: function_id.into(),
            container: object.container.clone(),
            path: object.path.clone(),
            version_tag: object.version_tag.clone(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.expires_at = ttl.map(|ttl| self.created_at + ttl);
        self
    }

    /// Whether this receipt already covers the given object version for `function_id`
    pub fn covers(&self, function_id: &str, object: &ObjectReference) -> bool {
        self.function_id == function_id
            && self.container == object.container
            && self.path == object.path
            && self.version_tag == object.version_tag
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// A stored receipt together with its store-assigned record version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRecord {
    pub receipt: Receipt,
    /// Compare-and-swap token; increases on every successful write
    pub version: u64,
}

/// Precondition for a receipt write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Create only if no record exists under the key
    IfAbsent,
    /// Replace only if the stored record still has this version
    IfVersion(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_covers_version() {
        let v1 = ObjectReference::new("input", "a.txt", "v1");
        let v2 = ObjectReference::new("input", "a.txt", "v2");
        let receipt = Receipt::new("Functions.Resize", &v1);

        assert!(receipt.covers("Functions.Resize", &v1));
        assert!(!receipt.covers("Functions.Resize", &v2));
        let other = ObjectReference::new("other", "a.txt", "v1");
        assert!(!receipt.covers("Functions.Resize", &other));
        assert!(!receipt.covers("Functions.Thumbnail", &v1));
    }

    #[test]
    fn test_receipt_expiry() {
        let object = ObjectReference::new("input", "a.txt", "v1");
        let receipt = Receipt::new("f", &object);
        assert!(!receipt.is_expired(Utc::now() + Duration::days(3650)));

        let receipt = receipt.with_ttl(Some(Duration::hours(1)));
        assert!(!receipt.is_expired(Utc::now()));
        assert!(receipt.is_expired(Utc::now() + Duration::hours(2)));
    }
}
