//! Receipt bookkeeping for the discovery handler
//!
//! A receipt records that a trigger message was enqueued for one
//! function and one object version. Claims go through the store's
//! compare-and-swap so concurrent handlers produce a single winner.

use std::sync::Arc;

use blobwatch_core::types::{ObjectReference, Receipt, ReceiptRecord, WriteCondition};
use blobwatch_core::utils::receipt_key;
use blobwatch_core::Result;
use blobwatch_storage::ReceiptStore;
use chrono::Utc;
use tracing::debug;

/// A receipt this handler just wrote, kept so it can be undone
#[derive(Debug, Clone)]
pub struct Claim {
    pub key: String,
    pub version: u64,
    pub previous: Option<ReceiptRecord>,
}

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed(Claim),
    /// A receipt for this exact version already exists
    AlreadyCurrent,
    /// Another handler changed the receipt between read and write
    Conflict,
}

pub struct ReceiptManager {
    store: Arc<dyn ReceiptStore>,
    host_id: String,
    ttl: Option<chrono::Duration>,
}

impl ReceiptManager {
    pub fn new(
        store: Arc<dyn ReceiptStore>,
        host_id: impl Into<String>,
        ttl: Option<chrono::Duration>,
    ) -> Self {
        Self {
            store,
            host_id: host_id.into(),
            ttl,
        }
    }

    pub fn key(&self, function_id: &str, object: &ObjectReference) -> String {
        receipt_key(&self.host_id, function_id, &object.container, &object.path)
    }

    pub async fn read(
        &self,
        function_id: &str,
        object: &ObjectReference,
    ) -> Result<Option<ReceiptRecord>> {
        self.store.get(&self.key(function_id, object)).await
    }

    /// Write a receipt for `object` unless one for this version exists
    pub async fn try_claim(
        &self,
        function_id: &str,
        object: &ObjectReference,
    ) -> Result<ClaimOutcome> {
        let key = self.key(function_id, object);
        let previous = self.store.get(&key).await?;

        if previous
            .as_ref()
            .is_some_and(|record| record.receipt.covers(function_id, object))
        {
            return Ok(ClaimOutcome::AlreadyCurrent);
        }

        let condition = match &previous {
            Some(record) => WriteCondition::IfVersion(record.version),
            None => WriteCondition::IfAbsent,
        };
        let receipt = Receipt::new(function_id, object).with_ttl(self.ttl);

        match self.store.put(&key, &receipt, condition).await {
            Ok(version) => Ok(ClaimOutcome::Claimed(Claim {
                key,
                version,
                previous,
            })),
            Err(e) if e.is_conflict() => {
                debug!("Lost receipt race for {}", key);
                Ok(ClaimOutcome::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    /// Undo a claim: delete the receipt, or put back the one it replaced
    ///
    /// Guarded by the claimed version, so a receipt written since by someone
    /// else is left alone.
    pub async fn release(&self, claim: &Claim) -> Result<()> {
        match &claim.previous {
            Some(previous) => {
                self.store
                    .put(
                        &claim.key,
                        &previous.receipt,
                        WriteCondition::IfVersion(claim.version),
                    )
                    .await?;
            }
            None => self.store.delete(&claim.key, claim.version).await?,
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired(Utc::now()).await
    }
}
