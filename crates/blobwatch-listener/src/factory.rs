//! Wiring of per-function listeners onto the shared host pollers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use blobwatch_core::config::BlobwatchConfig;
use blobwatch_core::types::BlobPathPattern;
use blobwatch_core::utils::host_trigger_queue_name;
use blobwatch_storage::{ObjectStore, QueueClient, ReceiptStore};
use tracing::info;

use crate::composite::{CompositeListener, Listener};
use crate::discovery::{DiscoveryPoller, DiscoveryPollerConfig};
use crate::error::{ListenerError, ListenerResult};
use crate::executor::{FunctionExecutor, TriggeredFunctionInstanceFactory};
use crate::queue_listener::{QueuePoller, QueuePollerConfig};
use crate::queue_writer::{TriggerQueueWriter, WriterConfig};
use crate::receipts::ReceiptManager;
use crate::shared::{SharedListenerHandle, SharedListenerRegistry};
use crate::trigger::BlobTriggerHandler;
use crate::watchers::{BlobWrittenWatcher, MessageEnqueuedWatcher, SharedQueueWatcher};

/// Tuning shared by every listener on a host
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub discovery: DiscoveryPollerConfig,
    pub queue: QueuePollerConfig,
    pub writer: WriterConfig,
    pub receipt_ttl: Option<chrono::Duration>,
}

impl From<&BlobwatchConfig> for PipelineSettings {
    fn from(config: &BlobwatchConfig) -> Self {
        Self {
            discovery: DiscoveryPollerConfig::from(&config.discovery),
            queue: QueuePollerConfig::from(&config.queue),
            writer: WriterConfig::from(&config.queue),
            receipt_ttl: config.receipts.ttl(),
        }
    }
}

/// Host-level collaborators handed to every listener factory
#[derive(Clone)]
pub struct ListenerFactoryContext {
    pub host_id: String,
    pub shared: Arc<SharedListenerRegistry>,
    pub objects: Arc<dyn ObjectStore>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub queues: Arc<dyn QueueClient>,
    pub settings: PipelineSettings,
}

impl ListenerFactoryContext {
    pub fn new(
        host_id: impl Into<String>,
        objects: Arc<dyn ObjectStore>,
        receipts: Arc<dyn ReceiptStore>,
        queues: Arc<dyn QueueClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            shared: Arc::new(SharedListenerRegistry::new()),
            objects,
            receipts,
            queues,
            settings,
        }
    }

    pub fn trigger_queue_name(&self) -> String {
        host_trigger_queue_name(&self.host_id)
    }
}

/// Builds the listener for one blob-triggered function
pub struct BlobListenerFactory {
    function_id: String,
    pattern: BlobPathPattern,
    instances: Arc<dyn TriggeredFunctionInstanceFactory>,
}

impl BlobListenerFactory {
    /// Fails on a malformed pattern
    pub fn new(
        function_id: impl Into<String>,
        pattern: &str,
        instances: Arc<dyn TriggeredFunctionInstanceFactory>,
    ) -> ListenerResult<Self> {
        let function_id = function_id.into();
        if function_id.trim().is_empty() {
            return Err(ListenerError::InvalidRegistration(
                "function id must not be empty".into(),
            ));
        }
        let pattern = BlobPathPattern::parse(pattern).map_err(|e| {
            ListenerError::InvalidRegistration(format!("{}: {}", function_id, e))
        })?;
        Ok(Self {
            function_id,
            pattern,
            instances,
        })
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn pattern(&self) -> &BlobPathPattern {
        &self.pattern
    }

    /// Register the function with the host's shared pollers
    ///
    /// The first factory on a host creates the pollers, so its executor is
    /// the one the queue poller runs functions with.
    pub async fn create(
        &self,
        executor: Arc<dyn FunctionExecutor>,
        context: &ListenerFactoryContext,
    ) -> ListenerResult<CompositeListener> {
        let settings = &context.settings;
        let queue_name = context.trigger_queue_name();
        let queue = context.queues.queue(&queue_name).await?;

        let queue_watcher = context
            .shared
            .get_or_create::<SharedQueueWatcher, _>("", || Ok(SharedQueueWatcher::new()))?;

        let discovery = context.shared.get_or_create::<DiscoveryPoller, _>("", || {
            Ok(DiscoveryPoller::new(
                settings.discovery.clone(),
                Arc::clone(&context.objects),
                Arc::clone(&context.receipts),
            ))
        })?;

        let queue_poller = context
            .shared
            .get_or_create::<QueuePoller, _>(&queue_name, || {
                let written: Arc<dyn BlobWrittenWatcher> = discovery.clone();
                Ok(QueuePoller::new(
                    settings.queue.clone(),
                    Arc::clone(&queue),
                    Arc::clone(&context.objects),
                    executor,
                    queue_watcher.subscribe(&queue_name),
                    Some(written),
                ))
            })?;

        // Claims the function id; nothing runs until the listener starts
        queue_poller.register_suspended(
            &self.function_id,
            self.pattern.clone(),
            Arc::clone(&self.instances),
        )?;

        let enqueued: Arc<dyn MessageEnqueuedWatcher> = queue_watcher;
        let writer = TriggerQueueWriter::new(queue, Some(enqueued), settings.writer.clone());
        let handler = Arc::new(BlobTriggerHandler::new(
            self.function_id.clone(),
            self.pattern.clone(),
            Arc::clone(&context.objects),
            ReceiptManager::new(
                Arc::clone(&context.receipts),
                context.host_id.clone(),
                settings.receipt_ttl,
            ),
            Arc::new(writer),
        ));

        info!(
            "Blob trigger {} listening on {} via {}",
            self.function_id, self.pattern, queue_name
        );

        let binding = FunctionBinding {
            function_id: self.function_id.clone(),
            handler,
            discovery: Arc::clone(&discovery),
            queue_poller: Arc::clone(&queue_poller),
            attached: AtomicBool::new(false),
        };
        let listeners: Vec<Arc<dyn Listener>> = vec![
            Arc::new(binding),
            Arc::new(SharedListenerHandle::new(discovery)),
            Arc::new(SharedListenerHandle::new(queue_poller)),
        ];
        Ok(CompositeListener::new(listeners))
    }
}

/// One function's place on the shared pollers
///
/// Only a started function is scanned for and run. Stopping takes it off
/// discovery and suspends it on the queue, so pollers kept alive by other
/// functions leave it alone; its queued messages wait for the next start.
struct FunctionBinding {
    function_id: String,
    handler: Arc<BlobTriggerHandler>,
    discovery: Arc<DiscoveryPoller>,
    queue_poller: Arc<QueuePoller>,
    attached: AtomicBool,
}

#[async_trait]
impl Listener for FunctionBinding {
    async fn start(&self) -> ListenerResult<()> {
        if self.attached.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if !self.queue_poller.resume(&self.function_id) {
            self.attached.store(false, Ordering::SeqCst);
            return Err(ListenerError::Internal(format!(
                "function {} is no longer registered on {}",
                self.function_id,
                self.queue_poller.queue_name()
            )));
        }
        self.discovery.register(Arc::clone(&self.handler));
        Ok(())
    }

    async fn stop(&self) -> ListenerResult<()> {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.discovery.unregister(&self.function_id);
        self.queue_poller.suspend(&self.function_id);
        Ok(())
    }
}
