//! Discovery handler
//!
//! Decides whether a listed object needs a trigger message for one
//! function. The receipt is claimed before the message is enqueued; if the
//! enqueue then fails the claim is reverted, so the object is retried on a
//! later scan instead of being silently skipped.

use std::sync::Arc;

use blobwatch_core::types::{BlobPathPattern, ObjectReference, TriggerMessage};
use blobwatch_storage::ObjectStore;
use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::error::ListenerResult;
use crate::metrics::names;
use crate::queue_writer::TriggerQueueWriter;
use crate::receipts::{ClaimOutcome, ReceiptManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Path is outside the function's pattern
    PatternMismatch,
    /// Object vanished before it could be re-read
    ObjectMissing,
    /// Object properties could not be read; retried next scan
    VersionUnreadable,
    /// A receipt already covers this version
    ReceiptCurrent,
    /// Another handler claimed this version concurrently
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Enqueue,
    Skip(SkipReason),
}

pub struct BlobTriggerHandler {
    function_id: String,
    pattern: BlobPathPattern,
    objects: Arc<dyn ObjectStore>,
    receipts: ReceiptManager,
    writer: Arc<TriggerQueueWriter>,
}

impl BlobTriggerHandler {
    pub fn new(
        function_id: impl Into<String>,
        pattern: BlobPathPattern,
        objects: Arc<dyn ObjectStore>,
        receipts: ReceiptManager,
        writer: Arc<TriggerQueueWriter>,
    ) -> Self {
        Self {
            function_id: function_id.into(),
            pattern,
            objects,
            receipts,
            writer,
        }
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn container(&self) -> &str {
        self.pattern.container()
    }

    pub fn receipts(&self) -> &ReceiptManager {
        &self.receipts
    }

    /// Enqueue a trigger for `object` if this version has not been triggered yet
    ///
    /// Errors mean the object should be retried on a later scan.
    pub async fn evaluate(&self, object: &ObjectReference) -> ListenerResult<Decision> {
        if object.container != self.pattern.container() || !self.pattern.is_match(&object.path)
        {
            return Ok(Decision::Skip(SkipReason::PatternMismatch));
        }

        // Listings can lag; trigger on the version stored now
        let current = match self.objects.head(&object.container, &object.path).await {
            Ok(metadata) => metadata.reference,
            Err(e) if e.is_not_found() => {
                debug!("{} disappeared before evaluation", object.full_path());
                return Ok(Decision::Skip(SkipReason::ObjectMissing));
            }
            Err(e) => {
                warn!(
                    "Could not read version of {} ({}): {}",
                    object.full_path(),
                    e.code(),
                    e
                );
                return Ok(Decision::Skip(SkipReason::VersionUnreadable));
            }
        };

        let claim = match self.receipts.try_claim(&self.function_id, &current).await? {
            ClaimOutcome::Claimed(claim) => claim,
            ClaimOutcome::AlreadyCurrent => {
                return Ok(Decision::Skip(SkipReason::ReceiptCurrent));
            }
            ClaimOutcome::Conflict => {
                counter!(names::RECEIPT_CONFLICTS_TOTAL).increment(1);
                return Ok(Decision::Skip(SkipReason::Conflict));
            }
        };

        let message = TriggerMessage::new(&self.function_id, &current);
        if let Err(e) = self.writer.enqueue(&message).await {
            if let Err(revert) = self.receipts.release(&claim).await {
                error!(
                    "Trigger for {} on {} is lost: enqueue failed ({}) and receipt {} could not be reverted: {}",
                    self.function_id, current, e, claim.key, revert
                );
            } else {
                warn!(
                    "Reverted receipt {} after enqueue failure: {}",
                    claim.key, e
                );
            }
            return Err(e);
        }

        info!(
            "Queued {} for function {} on {}",
            current,
            self.function_id,
            self.writer.queue_name()
        );
        counter!(names::DISCOVERY_MESSAGES_ENQUEUED_TOTAL).increment(1);
        Ok(Decision::Enqueue)
    }
}
