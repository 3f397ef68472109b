//! Blobwatch Listener - blob trigger discovery and execution
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Host process                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌────────────────┐    enqueue    ┌────────────────┐         │
//! │  │DiscoveryPoller │ ────────────▶ │  Trigger queue │         │
//! │  │                │               │  (per host)    │         │
//! │  │ - Paged scans  │               └───────┬────────┘         │
//! │  │ - Receipts CAS │    notify             │ fetch            │
//! │  │ - Backoff      │ ─ ─ ─ ─ ─ ─ ▶ ┌───────┴────────┐         │
//! │  └───────▲────────┘               │  QueuePoller   │         │
//! │          │                        │                │         │
//! │          │   objects written      │ - In-flight cap│         │
//! │          └─────────────────────── │ - Stale checks │         │
//! │                                   │ - Executor     │         │
//! │                                   └────────────────┘         │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each registered function gets a [`CompositeListener`] over handles to
//! the two shared pollers, which run while at least one handle is started.
//!
//! # Guarantees
//!
//! - **At least once**: a trigger message is enqueued for every object
//!   version seen by a scan; failed executions are redelivered
//! - **Once per version**: receipts written with compare-and-swap stop
//!   repeated scans and concurrent hosts from queueing the same version twice
//! - **Latest version only**: messages for replaced or deleted objects are
//!   dropped without running the function

mod composite;
mod discovery;
mod error;
mod executor;
mod factory;
mod lifecycle;
pub mod metrics;
mod queue_listener;
mod queue_writer;
mod receipts;
mod shared;
mod trigger;
mod watchers;

pub use composite::{CompositeListener, Listener};
pub use discovery::{DiscoveryPoller, DiscoveryPollerConfig, DiscoveryStats};
pub use error::{ListenerError, ListenerResult};
pub use executor::{
    DefaultInstanceFactory, FunctionExecutor, TriggerInput, TriggeredFunctionInstanceFactory,
};
pub use factory::{BlobListenerFactory, ListenerFactoryContext, PipelineSettings};
pub use queue_listener::{MessageOutcome, QueuePoller, QueuePollerConfig, QueuePollerStats};
pub use queue_writer::{TriggerQueueWriter, WriterConfig};
pub use receipts::{Claim, ClaimOutcome, ReceiptManager};
pub use shared::{SharedListener, SharedListenerHandle, SharedListenerRegistry};
pub use trigger::{BlobTriggerHandler, Decision, SkipReason};
pub use watchers::{BlobWrittenWatcher, MessageEnqueuedWatcher, SharedQueueWatcher};

// Re-export types from core
pub use blobwatch_core::types::{
    BindingData, BlobPathPattern, FunctionInstance, FunctionResult, ObjectReference,
    TriggerMessage,
};
