//! Object reference types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity plus observed version of a stored object.
///
/// Identity is `(container, path)`; `version_tag` is the ETag of the version
/// that was observed and changes on every write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub container: String,
    pub path: String,
    pub version_tag: String,
}

impl ObjectReference {
    pub fn new(
        container: impl Into<String>,
        path: impl Into<String>,
        version_tag: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
            version_tag: version_tag.into(),
        }
    }

    /// `container/path`, the identity without the version
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.container, self.path)
    }

    /// Whether both references name the same object, regardless of version
    pub fn same_object(&self, other: &ObjectReference) -> bool {
        self.container == other.container && self.path == other.path
    }
}

impl std::fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.container, self.path, self.version_tag)
    }
}

/// Object properties returned by listing and head calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub reference: ObjectReference,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a container listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectMetadata>,
    /// Token to resume listing after this page; `None` when the listing is complete
    pub continuation: Option<String>,
}

impl ObjectPage {
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_reference_identity() {
        let v1 = ObjectReference::new("input", "docs/a.txt", "v1");
        let v2 = ObjectReference::new("input", "docs/a.txt", "v2");

        assert!(v1.same_object(&v2));
        assert_ne!(v1, v2);
        assert_eq!(v1.full_path(), "input/docs/a.txt");
        assert_eq!(v1.to_string(), "input/docs/a.txt@v1");
    }
}
