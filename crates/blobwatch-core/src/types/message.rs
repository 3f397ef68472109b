//! Trigger message payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ObjectReference;
use crate::BLOB_TRIGGER_MESSAGE_TYPE;

/// Queue payload asking the execution stage to run one function on one object version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub function_id: String,
    pub container: String,
    pub path: String,
    pub version_tag: String,
    pub enqueued_at: DateTime<Utc>,
}

impl TriggerMessage {
    pub fn new(function_id: impl Into<String>, object: &ObjectReference) -> Self {
        Self {
            message_type: BLOB_TRIGGER_MESSAGE_TYPE.to_string(),
            function_id: function_id.into(),
            container: object.container.clone(),
            path: object.path.clone(),
            version_tag: object.version_tag.clone(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn object(&self) -> ObjectReference {
        ObjectReference::new(&self.container, &self.path, &self.version_tag)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a queue body, rejecting messages of another type
    pub fn from_json(body: &str) -> crate::Result<Self> {
        let message: TriggerMessage = serde_json::from_str(body)?;
        if message.message_type != BLOB_TRIGGER_MESSAGE_TYPE {
            return Err(crate::Error::InvalidArgument(format!(
                "Unsupported message type: {}",
                message.message_type
            )));
        }
        Ok(message)
    }
}
