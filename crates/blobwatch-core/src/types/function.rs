//! Function invocation types

use bytes::Bytes;
use uuid::Uuid;

use super::{BindingData, ObjectReference};

/// A materialized invocation of a triggered function
#[derive(Debug, Clone)]
pub struct FunctionInstance {
    pub id: Uuid,
    pub function_id: String,
    pub trigger: ObjectReference,
    pub content: Bytes,
    pub binding_data: BindingData,
    /// Queue message that caused this invocation
    pub message_id: String,
    pub delivery_count: u32,
}

/// Outcome reported by a function executor
#[derive(Debug, Clone, Default)]
pub struct FunctionResult {
    pub succeeded: bool,
    pub error: Option<String>,
    /// Objects the function wrote, reported back for prompt discovery
    pub written_objects: Vec<ObjectReference>,
}

impl FunctionResult {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error: Some(error.into()),
            written_objects: Vec::new(),
        }
    }

    pub fn with_written(mut self, object: ObjectReference) -> Self {
        self.written_objects.push(object);
        self
    }
}
