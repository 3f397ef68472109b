//! Function execution seams

use async_trait::async_trait;
use blobwatch_core::types::{BindingData, FunctionInstance, FunctionResult, ObjectReference};
use bytes::Bytes;
use uuid::Uuid;

/// Everything known about one delivery of a trigger
#[derive(Debug, Clone)]
pub struct TriggerInput {
    pub trigger: ObjectReference,
    pub content: Bytes,
    pub binding_data: BindingData,
    pub message_id: String,
    pub delivery_count: u32,
}

/// Runs user functions
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    async fn execute(&self, instance: FunctionInstance) -> FunctionResult;
}

/// Builds the invocation for a registered function
pub trait TriggeredFunctionInstanceFactory: Send + Sync {
    fn create(&self, function_id: &str, input: TriggerInput) -> FunctionInstance;
}

/// Plain instance with a fresh id
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInstanceFactory;

impl TriggeredFunctionInstanceFactory for DefaultInstanceFactory {
    fn create(&self, function_id: &str, input: TriggerInput) -> FunctionInstance {
        FunctionInstance {
            id: Uuid::new_v4(),
            function_id: function_id.to_string(),
            trigger: input.trigger,
            content: input.content,
            binding_data: input.binding_data,
            message_id: input.message_id,
            delivery_count: input.delivery_count,
        }
    }
}
