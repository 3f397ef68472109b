//! Discovery poller
//!
//! Handles:
//! - Periodic paged scans of every container with registered handlers
//! - Per-container exponential backoff when listing fails
//! - Immediate evaluation of objects written by functions on this host
//! - Optional purge of expired receipts
//!
//! One poller runs per host and fans each listed object out to the
//! handlers registered for its container.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blobwatch_core::config::DiscoveryConfig;
use blobwatch_core::types::ObjectReference;
use blobwatch_core::utils::exponential_backoff;
use blobwatch_storage::{ObjectStore, ReceiptStore};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::composite::Listener;
use crate::error::ListenerResult;
use crate::lifecycle::PollingLoop;
use crate::metrics::names;
use crate::shared::SharedListener;
use crate::trigger::{BlobTriggerHandler, Decision};
use crate::watchers::BlobWrittenWatcher;

/// Configuration for the discovery poller
#[derive(Debug, Clone)]
pub struct DiscoveryPollerConfig {
    /// Delay between full scan cycles
    pub poll_interval: Duration,
    /// First delay after a container listing fails
    pub initial_backoff: Duration,
    /// Longest delay between listing attempts of a failing container
    pub max_backoff: Duration,
    /// Objects requested per listing call
    pub page_size: usize,
    /// Pages read from one container before moving on
    pub max_pages_per_cycle: usize,
    /// Objects evaluated concurrently within a page
    pub evaluation_concurrency: usize,
    /// How often to purge expired receipts, if at all
    pub receipt_gc_interval: Option<Duration>,
}

impl Default for DiscoveryPollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            page_size: 1000,
            max_pages_per_cycle: 10,
            evaluation_concurrency: 16,
            receipt_gc_interval: None,
        }
    }
}

impl From<&DiscoveryConfig> for DiscoveryPollerConfig {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            page_size: config.page_size,
            max_pages_per_cycle: config.max_pages_per_cycle,
            evaluation_concurrency: config.evaluation_concurrency,
            receipt_gc_interval: config.receipt_gc_interval(),
        }
    }
}

/// Statistics for the discovery poller
#[derive(Debug, Clone, Default)]
pub struct DiscoveryStats {
    /// Completed scan cycles
    pub cycles: u64,
    /// Cycles cut short by a stop request
    pub cycles_interrupted: u64,
    /// Objects returned by listings
    pub objects_listed: u64,
    /// Trigger messages enqueued
    pub messages_enqueued: u64,
    /// Listing calls that failed
    pub listing_failures: u64,
    /// Evaluations that failed and will be retried
    pub evaluation_failures: u64,
    /// Receipts removed by garbage collection
    pub receipts_purged: u64,
}

/// Scan position and health of one container
#[derive(Debug, Default)]
struct ContainerScan {
    continuation: Option<String>,
    failures: u32,
    retry_at: Option<Instant>,
}

struct DiscoveryState {
    config: DiscoveryPollerConfig,
    objects: Arc<dyn ObjectStore>,
    receipts: Arc<dyn ReceiptStore>,
    /// Handlers by container
    handlers: RwLock<HashMap<String, Vec<Arc<BlobTriggerHandler>>>>,
    scans: Mutex<HashMap<String, ContainerScan>>,
    /// Objects written on this host, evaluated ahead of the next scan
    written: Mutex<Vec<ObjectReference>>,
    /// Newly registered containers, scanned ahead of the next cycle
    fresh: Mutex<Vec<String>>,
    /// Set while the background loop runs; written objects are ignored otherwise
    running: AtomicBool,
    wake: Notify,
    stats: RwLock<DiscoveryStats>,
}

/// Shared scanner feeding trigger messages to the host queue
pub struct DiscoveryPoller {
    state: Arc<DiscoveryState>,
    polling: PollingLoop,
}

impl DiscoveryPoller {
    pub fn new(
        config: DiscoveryPollerConfig,
        objects: Arc<dyn ObjectStore>,
        receipts: Arc<dyn ReceiptStore>,
    ) -> Self {
        Self {
            state: Arc::new(DiscoveryState {
                config,
                objects,
                receipts,
                handlers: RwLock::new(HashMap::new()),
                scans: Mutex::new(HashMap::new()),
                written: Mutex::new(Vec::new()),
                fresh: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                wake: Notify::new(),
                stats: RwLock::new(DiscoveryStats::default()),
            }),
            polling: PollingLoop::new("Discovery poller"),
        }
    }

    /// Add a handler; a running poller scans its container right away
    pub fn register(&self, handler: Arc<BlobTriggerHandler>) {
        let container = handler.container().to_string();
        info!(
            "Watching container {} for function {}",
            container,
            handler.function_id()
        );
        self.state
            .handlers
            .write()
            .entry(container.clone())
            .or_default()
            .push(handler);
        // Restart from the beginning so the new handler sees every object
        self.state.scans.lock().insert(container.clone(), ContainerScan::default());
        self.state.fresh.lock().push(container);
        self.state.wake.notify_one();
    }

    /// Remove every handler of `function_id`; a container left without
    /// handlers is no longer scanned
    pub fn unregister(&self, function_id: &str) -> bool {
        let mut handlers = self.state.handlers.write();
        let mut removed = false;
        let mut emptied = Vec::new();
        for (container, list) in handlers.iter_mut() {
            let before = list.len();
            list.retain(|handler| handler.function_id() != function_id);
            removed |= list.len() != before;
            if list.is_empty() {
                emptied.push(container.clone());
            }
        }
        if emptied.is_empty() && !removed {
            return false;
        }

        let mut scans = self.state.scans.lock();
        for container in emptied {
            handlers.remove(&container);
            scans.remove(&container);
        }
        if removed {
            info!("Function {} no longer watched", function_id);
        }
        removed
    }

    pub fn containers(&self) -> Vec<String> {
        self.state.handlers.read().keys().cloned().collect()
    }

    pub fn stats(&self) -> DiscoveryStats {
        self.state.stats.read().clone()
    }

    /// Run one scan cycle over every container, outside the background loop
    pub async fn poll_once(&self) {
        self.state.scan_cycle(&CancellationToken::new()).await;
    }

    pub async fn is_running(&self) -> bool {
        self.polling.is_running().await
    }

    fn spawn(&self) -> impl FnOnce(CancellationToken) -> futures::future::BoxFuture<'static, ()> {
        let state = Arc::clone(&self.state);
        move |cancel| Box::pin(run(state, cancel))
    }
}

async fn run(state: Arc<DiscoveryState>, cancel: CancellationToken) {
    info!(
        "Discovery poller started (interval {:?})",
        state.config.poll_interval
    );
    state.running.store(true, Ordering::SeqCst);
    let mut next_scan = Instant::now();
    let mut next_gc = state.config.receipt_gc_interval.map(|every| Instant::now() + every);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        state.evaluate_written().await;

        let fresh = std::mem::take(&mut *state.fresh.lock());
        if Instant::now() >= next_scan {
            state.scan_cycle(&cancel).await;
            next_scan = Instant::now() + state.config.poll_interval;
        } else {
            state.scan_fresh(fresh, &cancel).await;
        }

        if let (Some(due), Some(every)) = (next_gc, state.config.receipt_gc_interval) {
            if Instant::now() >= due && !cancel.is_cancelled() {
                state.purge_receipts().await;
                next_gc = Some(Instant::now() + every);
            }
        }

        let gc_due = async move {
            match next_gc {
                Some(due) => tokio::time::sleep_until(due).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = state.wake.notified() => {}
            _ = tokio::time::sleep_until(next_scan) => {}
            _ = gc_due => {}
        }
    }

    state.running.store(false, Ordering::SeqCst);
    let dropped = std::mem::take(&mut *state.written.lock()).len();
    if dropped > 0 {
        debug!("Dropped {} written objects on stop; the next scan finds them", dropped);
    }
    info!("Discovery poller stopped");
}

impl DiscoveryState {
    async fn scan_cycle(&self, cancel: &CancellationToken) {
        let mut containers: Vec<String> = self.handlers.read().keys().cloned().collect();
        containers.sort();

        for container in containers {
            if cancel.is_cancelled() {
                break;
            }
            self.scan_container(&container, cancel).await;
        }

        if cancel.is_cancelled() {
            debug!("Scan cycle interrupted by stop");
            self.stats.write().cycles_interrupted += 1;
            return;
        }
        self.stats.write().cycles += 1;
        counter!(names::DISCOVERY_CYCLES_TOTAL).increment(1);
    }

    async fn scan_fresh(&self, mut containers: Vec<String>, cancel: &CancellationToken) {
        containers.sort();
        containers.dedup();
        for container in containers {
            if cancel.is_cancelled() {
                return;
            }
            if self.handlers.read().contains_key(&container) {
                debug!("Scanning newly watched container {}", container);
                self.scan_container(&container, cancel).await;
            }
        }
    }

    async fn scan_container(&self, container: &str, cancel: &CancellationToken) {
        let mut continuation = {
            let scans = self.scans.lock();
            match scans.get(container) {
                Some(scan) if scan.retry_at.is_some_and(|at| Instant::now() < at) => {
                    debug!("Skipping {} until its backoff expires", container);
                    return;
                }
                Some(scan) => scan.continuation.clone(),
                None => None,
            }
        };

        for _ in 0..self.config.max_pages_per_cycle.max(1) {
            let page = match self
                .objects
                .list(container, continuation.as_deref(), self.config.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.record_listing_failure(container, continuation, &e);
                    return;
                }
            };

            let listed: Vec<ObjectReference> =
                page.objects.into_iter().map(|m| m.reference).collect();
            self.stats.write().objects_listed += listed.len() as u64;
            counter!(names::DISCOVERY_OBJECTS_LISTED_TOTAL).increment(listed.len() as u64);

            // The page is always evaluated in full, even when stopping
            self.evaluate_all(listed).await;

            continuation = page.continuation;
            self.scans.lock().insert(
                container.to_string(),
                ContainerScan {
                    continuation: continuation.clone(),
                    failures: 0,
                    retry_at: None,
                },
            );

            if continuation.is_none() || cancel.is_cancelled() {
                return;
            }
        }
    }

    fn record_listing_failure(
        &self,
        container: &str,
        continuation: Option<String>,
        error: &blobwatch_core::Error,
    ) {
        let mut scans = self.scans.lock();
        let scan = scans.entry(container.to_string()).or_default();
        scan.failures += 1;
        scan.continuation = continuation;
        let delay = exponential_backoff(
            self.config.initial_backoff,
            self.config.max_backoff,
            scan.failures,
        );
        scan.retry_at = Some(Instant::now() + delay);

        warn!(
            "Listing {} failed ({} in a row), retrying in {:?}: {}",
            container, scan.failures, delay, error
        );
        self.stats.write().listing_failures += 1;
        counter!(names::DISCOVERY_LISTING_FAILURES_TOTAL).increment(1);
    }

    /// Evaluate objects against every handler of their container
    async fn evaluate_all(&self, objects: Vec<ObjectReference>) {
        let work: Vec<(Arc<BlobTriggerHandler>, ObjectReference)> = {
            let handlers = self.handlers.read();
            objects
                .into_iter()
                .flat_map(|object| {
                    handlers
                        .get(&object.container)
                        .into_iter()
                        .flatten()
                        .map(move |handler| (Arc::clone(handler), object.clone()))
                        .collect::<Vec<_>>()
                })
                .collect()
        };
        if work.is_empty() {
            return;
        }

        stream::iter(work)
            .for_each_concurrent(self.config.evaluation_concurrency.max(1), |(handler, object)| async move {
                match handler.evaluate(&object).await {
                    Ok(Decision::Enqueue) => {
                        self.stats.write().messages_enqueued += 1;
                    }
                    Ok(Decision::Skip(reason)) => {
                        debug!(
                            "Skipped {} for {}: {:?}",
                            object,
                            handler.function_id(),
                            reason
                        );
                    }
                    Err(e) => {
                        warn!(
                            "Evaluating {} for {} failed, will retry: {}",
                            object,
                            handler.function_id(),
                            e
                        );
                        self.stats.write().evaluation_failures += 1;
                        counter!(names::DISCOVERY_EVALUATION_FAILURES_TOTAL).increment(1);
                    }
                }
            })
            .await;
    }

    async fn evaluate_written(&self) {
        let written = std::mem::take(&mut *self.written.lock());
        if written.is_empty() {
            return;
        }
        debug!("Evaluating {} objects written on this host", written.len());
        self.evaluate_all(written).await;
    }

    async fn purge_receipts(&self) {
        match self.receipts.purge_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(purged) => {
                info!("Purged {} expired receipts", purged);
                self.stats.write().receipts_purged += purged as u64;
                counter!(names::RECEIPTS_PURGED_TOTAL).increment(purged as u64);
            }
            Err(e) => error!("Failed to purge expired receipts: {}", e),
        }
    }
}

impl BlobWrittenWatcher for DiscoveryPoller {
    fn notify(&self, object: &ObjectReference) {
        if !self.state.running.load(Ordering::SeqCst) {
            debug!("Discovery poller stopped, ignoring written {}", object);
            return;
        }
        if !self.state.handlers.read().contains_key(&object.container) {
            return;
        }
        self.state.written.lock().push(object.clone());
        self.state.wake.notify_one();
    }
}

#[async_trait]
impl Listener for DiscoveryPoller {
    async fn start(&self) -> ListenerResult<()> {
        self.polling.start(self.spawn()).await;
        Ok(())
    }

    async fn stop(&self) -> ListenerResult<()> {
        self.polling.stop().await
    }
}

#[async_trait]
impl SharedListener for DiscoveryPoller {
    async fn acquire(&self) -> ListenerResult<()> {
        self.polling.acquire(self.spawn()).await;
        Ok(())
    }

    async fn release(&self) -> ListenerResult<()> {
        self.polling.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue_writer::{TriggerQueueWriter, WriterConfig};
    use crate::receipts::ReceiptManager;
    use blobwatch_core::types::{BlobPathPattern, TriggerMessage};
    use blobwatch_storage::{MemoryObjectStore, MemoryQueue, MemoryReceiptStore};
    use bytes::Bytes;

    struct Fixture {
        objects: Arc<MemoryObjectStore>,
        receipts: Arc<MemoryReceiptStore>,
        queue: Arc<MemoryQueue>,
        poller: DiscoveryPoller,
    }

    fn fixture(config: DiscoveryPollerConfig) -> Fixture {
        let objects = Arc::new(MemoryObjectStore::new());
        let receipts = Arc::new(MemoryReceiptStore::new());
        let queue = Arc::new(MemoryQueue::new("blobwatch-trigger-host", 5));
        let poller = DiscoveryPoller::new(config, objects.clone(), receipts.clone());
        Fixture {
            objects,
            receipts,
            queue,
            poller,
        }
    }

    fn quick() -> DiscoveryPollerConfig {
        DiscoveryPollerConfig {
            poll_interval: Duration::from_millis(50),
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(1),
            page_size: 2,
            max_pages_per_cycle: 10,
            evaluation_concurrency: 4,
            receipt_gc_interval: None,
        }
    }

    impl Fixture {
        fn register(&self, function_id: &str, pattern: &str) {
            let writer = TriggerQueueWriter::new(self.queue.clone(), None, WriterConfig::default());
            self.poller.register(Arc::new(BlobTriggerHandler::new(
                function_id,
                BlobPathPattern::parse(pattern).unwrap(),
                self.objects.clone(),
                ReceiptManager::new(self.receipts.clone(), "host", None),
                Arc::new(writer),
            )));
        }

        async fn put(&self, container: &str, path: &str) -> ObjectReference {
            self.objects
                .put(container, path, Bytes::from_static(b"data"))
                .await
                .unwrap()
        }

        fn triggered(&self) -> Vec<(String, String)> {
            let mut triggered: Vec<_> = self
                .queue
                .bodies()
                .iter()
                .map(|body| {
                    let message = TriggerMessage::from_json(body).unwrap();
                    (message.function_id, message.path)
                })
                .collect();
            triggered.sort();
            triggered
        }
    }

    #[tokio::test]
    async fn test_scan_triggers_each_function_once() {
        let fx = fixture(quick());
        fx.register("f", "input/{name}.txt");
        fx.register("g", "input");
        fx.put("input", "a.txt").await;
        fx.put("input", "b.png").await;
        fx.put("other", "c.txt").await;

        fx.poller.poll_once().await;
        fx.poller.poll_once().await;

        assert_eq!(
            fx.triggered(),
            vec![
                ("f".to_string(), "a.txt".to_string()),
                ("g".to_string(), "a.txt".to_string()),
                ("g".to_string(), "b.png".to_string()),
            ]
        );
        assert_eq!(fx.poller.stats().messages_enqueued, 3);
    }

    #[tokio::test]
    async fn test_ids_and_paths_that_share_separators_stay_apart() {
        let fx = fixture(quick());
        fx.register("a/bbb", "input");
        fx.register("a", "bbb");
        fx.put("input", "x").await;
        fx.put("bbb", "input/x").await;

        for _ in 0..4 {
            fx.poller.poll_once().await;
        }

        assert_eq!(fx.queue.enqueued_total(), 2);
        assert_eq!(fx.receipts.len(), 2);
        assert_eq!(
            fx.triggered(),
            vec![
                ("a".to_string(), "input/x".to_string()),
                ("a/bbb".to_string(), "x".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unregistered_function_is_no_longer_evaluated() {
        let fx = fixture(quick());
        fx.register("f", "input");
        fx.register("g", "input");
        fx.register("h", "other");

        assert!(fx.poller.unregister("f"));
        assert!(fx.poller.unregister("h"));
        assert!(!fx.poller.unregister("missing"));
        assert_eq!(fx.poller.containers(), vec!["input".to_string()]);

        fx.put("input", "a.txt").await;
        fx.put("other", "b.txt").await;
        fx.poller.poll_once().await;

        assert_eq!(fx.triggered(), vec![("g".to_string(), "a.txt".to_string())]);
        assert_eq!(fx.objects.list_calls("other"), 0);
    }

    #[tokio::test]
    async fn test_pages_are_capped_per_cycle() {
        let mut config = quick();
        config.page_size = 1;
        config.max_pages_per_cycle = 2;
        let fx = fixture(config);
        fx.register("f", "input");
        for name in ["a", "b", "c", "d", "e"] {
            fx.put("input", name).await;
        }

        fx.poller.poll_once().await;
        assert_eq!(fx.queue.len(), 2);
        fx.poller.poll_once().await;
        assert_eq!(fx.queue.len(), 4);
        fx.poller.poll_once().await;
        assert_eq!(fx.queue.len(), 5);
    }

    #[tokio::test]
    async fn test_listing_failure_backs_off_only_that_container() {
        let fx = fixture(quick());
        fx.register("f", "input");
        fx.register("g", "other");
        fx.put("input", "a.txt").await;
        fx.put("other", "b.txt").await;
        fx.objects.fail_next_lists("input", 1);

        fx.poller.poll_once().await;
        assert_eq!(fx.triggered(), vec![("g".to_string(), "b.txt".to_string())]);
        assert_eq!(fx.poller.stats().listing_failures, 1);

        // Still backing off
        fx.poller.poll_once().await;
        assert_eq!(fx.objects.list_calls("input"), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        fx.poller.poll_once().await;
        assert_eq!(fx.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_written_objects_skip_the_wait() {
        let mut config = quick();
        config.poll_interval = Duration::from_secs(3600);
        let fx = fixture(config);
        fx.register("f", "output");
        fx.poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let written = fx.put("output", "result.txt").await;
        fx.poller.notify(&written);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(fx.queue.len(), 1);
        fx.poller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_late_registration_is_scanned_immediately() {
        let mut config = quick();
        config.poll_interval = Duration::from_secs(3600);
        let fx = fixture(config);
        fx.register("f", "input");
        fx.put("other", "b.txt").await;

        fx.poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fx.register("g", "other");
        tokio::time::sleep(Duration::from_millis(100)).await;
        fx.poller.stop().await.unwrap();

        assert_eq!(fx.triggered(), vec![("g".to_string(), "b.txt".to_string())]);
        assert_eq!(fx.poller.stats().cycles, 1);
    }

    #[tokio::test]
    async fn test_stop_completes_current_page() {
        let fx = fixture(quick());
        fx.register("f", "input");
        fx.put("input", "a.txt").await;
        fx.objects.set_list_delay(Some(Duration::from_millis(200)));

        fx.poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fx.poller.stop().await.unwrap();

        assert_eq!(fx.queue.len(), 1);
        assert!(!fx.poller.is_running().await);

        let stats = fx.poller.stats();
        assert_eq!((stats.cycles, stats.cycles_interrupted), (0, 1));
    }

    #[tokio::test]
    async fn test_written_objects_ignored_while_stopped() {
        let fx = fixture(quick());
        fx.register("f", "output");

        let written = fx.put("output", "result.txt").await;
        fx.poller.notify(&written);
        assert!(fx.poller.state.written.lock().is_empty());

        fx.poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fx.poller.stop().await.unwrap();

        fx.poller.notify(&written);
        assert!(fx.poller.state.written.lock().is_empty());
    }

    #[tokio::test]
    async fn test_receipt_gc_runs_on_interval() {
        let mut config = quick();
        config.receipt_gc_interval = Some(Duration::from_millis(20));
        let fx = fixture(config);
        fx.register("f", "input");

        let object = ObjectReference::new("input", "a.txt", "0x1");
        let expired = blobwatch_core::types::Receipt::new("f", &object)
            .with_ttl(Some(chrono::Duration::milliseconds(1)));
        fx.receipts
            .put("host/f/input/a.txt", &expired, blobwatch_core::types::WriteCondition::IfAbsent)
            .await
            .unwrap();

        fx.poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        fx.poller.stop().await.unwrap();

        assert!(fx.receipts.is_empty());
        assert_eq!(fx.poller.stats().receipts_purged, 1);
    }

    #[tokio::test]
    async fn test_receipt_gc_does_not_wait_for_scans() {
        let mut config = quick();
        config.poll_interval = Duration::from_secs(3600);
        config.receipt_gc_interval = Some(Duration::from_millis(20));
        let fx = fixture(config);
        fx.register("f", "input");

        fx.poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Expires after the first scan; only the GC deadline can remove it
        let object = ObjectReference::new("input", "a.txt", "0x1");
        let expired = blobwatch_core::types::Receipt::new("f", &object)
            .with_ttl(Some(chrono::Duration::milliseconds(1)));
        fx.receipts
            .put("host/f/input/a.txt", &expired, blobwatch_core::types::WriteCondition::IfAbsent)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        fx.poller.stop().await.unwrap();

        assert!(fx.receipts.is_empty());
        assert_eq!(fx.poller.stats().cycles, 1);
    }
}
