//! Queue poller
//!
//! Handles:
//! - Fetching trigger messages with a bounded number in flight
//! - Adaptive polling delay, cut short when a message is enqueued locally
//! - Dropping messages that are stale, orphaned or point at deleted objects
//! - Holding back messages of suspended functions until they resume
//! - Executing the function and deleting the message on success
//!
//! Failed executions leave the message on the queue; it reappears after the
//! visibility timeout and the queue dead-letters it once it has been
//! delivered too many times.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blobwatch_core::config::QueueConfig;
use blobwatch_core::types::{BlobPathPattern, QueueMessage, TriggerMessage};
use blobwatch_storage::{ObjectStore, TriggerQueue};
use metrics::{counter, gauge, histogram};
use parking_lot::RwLock;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::composite::Listener;
use crate::error::{ListenerError, ListenerResult};
use crate::executor::{FunctionExecutor, TriggerInput, TriggeredFunctionInstanceFactory};
use crate::lifecycle::PollingLoop;
use crate::metrics::names;
use crate::shared::SharedListener;
use crate::watchers::BlobWrittenWatcher;

/// Configuration for the queue poller
#[derive(Debug, Clone)]
pub struct QueuePollerConfig {
    /// Most messages requested per fetch
    pub batch_size: usize,
    /// Most messages processed at once
    pub max_in_flight: usize,
    /// How long a fetched message stays hidden
    pub visibility_timeout: Duration,
    /// Delay after a non-empty fetch
    pub min_poll_interval: Duration,
    /// Longest delay after consecutive empty fetches
    pub max_poll_interval: Duration,
    /// Delivery count at which the queue dead-letters a message
    pub max_delivery_count: u32,
}

impl Default for QueuePollerConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            max_in_flight: 32,
            visibility_timeout: Duration::from_secs(600),
            min_poll_interval: Duration::from_millis(100),
            max_poll_interval: Duration::from_secs(60),
            max_delivery_count: 5,
        }
    }
}

impl From<&QueueConfig> for QueuePollerConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_in_flight: config.max_in_flight,
            visibility_timeout: config.visibility_timeout(),
            min_poll_interval: config.min_poll_interval(),
            max_poll_interval: config.max_poll_interval(),
            max_delivery_count: config.max_delivery_count,
        }
    }
}

/// What happened to one delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Function succeeded and the message was deleted
    Completed,
    /// Function failed; the message stays for redelivery
    Failed,
    /// Body was not a trigger message; left for dead-lettering
    Malformed,
    /// No function with that id is registered; deleted
    UnknownFunction,
    /// Object no longer exists; deleted
    ObjectMissing,
    /// Object changed since the message was written; deleted
    Superseded,
    /// Object could not be read; left for redelivery
    Unavailable,
    /// Function is suspended; left for redelivery
    Suspended,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOutcome::Completed => "completed",
            MessageOutcome::Failed => "failed",
            MessageOutcome::Malformed => "malformed",
            MessageOutcome::UnknownFunction => "unknown_function",
            MessageOutcome::ObjectMissing => "object_missing",
            MessageOutcome::Superseded => "superseded",
            MessageOutcome::Unavailable => "unavailable",
            MessageOutcome::Suspended => "suspended",
        }
    }
}

/// Statistics for the queue poller
#[derive(Debug, Clone, Default)]
pub struct QueuePollerStats {
    /// Messages handed out by the queue
    pub fetched: u64,
    /// Successful executions
    pub completed: u64,
    /// Failed executions
    pub failed: u64,
    /// Messages deleted without running anything
    pub dropped: u64,
    /// Messages left untouched for redelivery
    pub retained: u64,
    /// Messages being processed right now
    pub in_flight: u64,
}

struct Registration {
    pattern: BlobPathPattern,
    instances: Arc<dyn TriggeredFunctionInstanceFactory>,
    suspended: bool,
}

struct QueueState {
    config: QueuePollerConfig,
    queue: Arc<dyn TriggerQueue>,
    objects: Arc<dyn ObjectStore>,
    executor: Arc<dyn FunctionExecutor>,
    written: Option<Arc<dyn BlobWrittenWatcher>>,
    registrations: RwLock<HashMap<String, Registration>>,
    wake: Arc<Notify>,
    stats: RwLock<QueuePollerStats>,
}

/// Shared consumer of one host trigger queue
pub struct QueuePoller {
    state: Arc<QueueState>,
    polling: PollingLoop,
}

impl QueuePoller {
    /// `wake` is fired by whoever enqueues to `queue` on this host
    pub fn new(
        config: QueuePollerConfig,
        queue: Arc<dyn TriggerQueue>,
        objects: Arc<dyn ObjectStore>,
        executor: Arc<dyn FunctionExecutor>,
        wake: Arc<Notify>,
        written: Option<Arc<dyn BlobWrittenWatcher>>,
    ) -> Self {
        Self {
            state: Arc::new(QueueState {
                config,
                queue,
                objects,
                executor,
                written,
                registrations: RwLock::new(HashMap::new()),
                wake,
                stats: RwLock::new(QueuePollerStats::default()),
            }),
            polling: PollingLoop::new("Queue poller"),
        }
    }

    pub fn queue_name(&self) -> &str {
        self.state.queue.name()
    }

    /// Route messages for `function_id` to `instances`
    pub fn register(
        &self,
        function_id: &str,
        pattern: BlobPathPattern,
        instances: Arc<dyn TriggeredFunctionInstanceFactory>,
    ) -> ListenerResult<()> {
        self.insert(function_id, pattern, instances, false)
    }

    /// Like [`register`](Self::register), but messages wait until [`resume`](Self::resume)
    pub fn register_suspended(
        &self,
        function_id: &str,
        pattern: BlobPathPattern,
        instances: Arc<dyn TriggeredFunctionInstanceFactory>,
    ) -> ListenerResult<()> {
        self.insert(function_id, pattern, instances, true)
    }

    fn insert(
        &self,
        function_id: &str,
        pattern: BlobPathPattern,
        instances: Arc<dyn TriggeredFunctionInstanceFactory>,
        suspended: bool,
    ) -> ListenerResult<()> {
        let mut registrations = self.state.registrations.write();
        if registrations.contains_key(function_id) {
            return Err(ListenerError::DuplicateFunction(function_id.to_string()));
        }
        registrations.insert(
            function_id.to_string(),
            Registration {
                pattern,
                instances,
                suspended,
            },
        );
        debug!(
            "Function {} registered on {}",
            function_id,
            self.state.queue.name()
        );
        Ok(())
    }

    pub fn unregister(&self, function_id: &str) -> bool {
        self.state.registrations.write().remove(function_id).is_some()
    }

    /// Stop running `function_id` while keeping its pending messages queued
    pub fn suspend(&self, function_id: &str) -> bool {
        self.set_suspended(function_id, true)
    }

    pub fn resume(&self, function_id: &str) -> bool {
        self.set_suspended(function_id, false)
    }

    fn set_suspended(&self, function_id: &str, suspended: bool) -> bool {
        match self.state.registrations.write().get_mut(function_id) {
            Some(registration) => {
                registration.suspended = suspended;
                debug!(
                    "Function {} {} on {}",
                    function_id,
                    if suspended { "suspended" } else { "resumed" },
                    self.state.queue.name()
                );
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> QueuePollerStats {
        self.state.stats.read().clone()
    }

    /// Process one already-fetched message, outside the background loop
    pub async fn process(&self, message: QueueMessage) -> MessageOutcome {
        self.state.process(message).await
    }

    pub async fn is_running(&self) -> bool {
        self.polling.is_running().await
    }

    fn spawn(&self) -> impl FnOnce(CancellationToken) -> futures::future::BoxFuture<'static, ()> {
        let state = Arc::clone(&self.state);
        move |cancel| Box::pin(run(state, cancel))
    }
}

async fn run(state: Arc<QueueState>, cancel: CancellationToken) {
    let config = state.config.clone();
    info!(
        "Queue poller started on {} (max {} in flight)",
        state.queue.name(),
        config.max_in_flight
    );

    let semaphore = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let tracker = TaskTracker::new();
    let mut delay = config.min_poll_interval;

    loop {
        // Wait for room before fetching anything
        let first = tokio::select! {
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = cancel.cancelled() => break,
        };
        let capacity = (semaphore.available_permits() + 1).min(config.batch_size.max(1));

        let messages = match state.queue.fetch(capacity, config.visibility_timeout).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Fetching from {} failed: {}", state.queue.name(), e);
                Vec::new()
            }
        };

        if messages.is_empty() {
            drop(first);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = state.wake.notified() => {
                    delay = config.min_poll_interval;
                }
                _ = tokio::time::sleep(delay) => {
                    delay = (delay * 2).min(config.max_poll_interval);
                }
            }
            continue;
        }

        delay = config.min_poll_interval;
        state.stats.write().fetched += messages.len() as u64;
        counter!(names::QUEUE_MESSAGES_FETCHED_TOTAL).increment(messages.len() as u64);

        let mut first = Some(first);
        for message in messages {
            let permit = match first.take() {
                Some(permit) => permit,
                None => match acquire(&semaphore).await {
                    Some(permit) => permit,
                    None => break,
                },
            };
            let state = Arc::clone(&state);
            tracker.spawn(async move {
                state.process(message).await;
                drop(permit);
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracker.close();
    if !tracker.is_empty() {
        info!(
            "Queue poller on {} waiting for {} in-flight messages",
            state.queue.name(),
            tracker.len()
        );
    }
    tracker.wait().await;
    info!("Queue poller stopped on {}", state.queue.name());
}

async fn acquire(semaphore: &Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
    Arc::clone(semaphore).acquire_owned().await.ok()
}

impl QueueState {
    async fn process(&self, message: QueueMessage) -> MessageOutcome {
        self.adjust_in_flight(1);
        let outcome = self.handle(&message).await;
        self.adjust_in_flight(-1);

        {
            let mut stats = self.stats.write();
            match outcome {
                MessageOutcome::Completed => stats.completed += 1,
                MessageOutcome::Failed => stats.failed += 1,
                MessageOutcome::Malformed
                | MessageOutcome::Unavailable
                | MessageOutcome::Suspended => stats.retained += 1,
                MessageOutcome::UnknownFunction
                | MessageOutcome::ObjectMissing
                | MessageOutcome::Superseded => stats.dropped += 1,
            }
        }
        counter!(names::QUEUE_MESSAGES_PROCESSED_TOTAL, "outcome" => outcome.as_str())
            .increment(1);
        outcome
    }

    fn adjust_in_flight(&self, delta: i64) {
        let mut stats = self.stats.write();
        stats.in_flight = (stats.in_flight as i64 + delta).max(0) as u64;
        gauge!(names::QUEUE_MESSAGES_IN_FLIGHT).set(stats.in_flight as f64);
    }

    async fn handle(&self, message: &QueueMessage) -> MessageOutcome {
        let trigger = match TriggerMessage::from_json(&message.body) {
            Ok(trigger) => trigger,
            Err(e) => {
                error!(
                    "Message {} on {} is not a trigger message: {}",
                    message.id,
                    self.queue.name(),
                    e
                );
                return MessageOutcome::Malformed;
            }
        };

        let registration = self
            .registrations
            .read()
            .get(&trigger.function_id)
            .map(|r| (r.pattern.clone(), Arc::clone(&r.instances), r.suspended));
        let Some((pattern, instances, suspended)) = registration else {
            warn!(
                "No function {} registered on {}, dropping message {}",
                trigger.function_id,
                self.queue.name(),
                message.id
            );
            self.delete(message).await;
            return MessageOutcome::UnknownFunction;
        };
        if suspended {
            debug!(
                "Function {} is suspended, leaving message {}",
                trigger.function_id, message.id
            );
            return MessageOutcome::Suspended;
        }

        let expected = trigger.object();
        let (metadata, content) = match self.objects.get(&expected.container, &expected.path).await
        {
            Ok(found) => found,
            Err(e) if e.is_not_found() => {
                info!("{} no longer exists, dropping message {}", expected, message.id);
                self.delete(message).await;
                return MessageOutcome::ObjectMissing;
            }
            Err(e) => {
                warn!(
                    "Could not read {} for message {} ({}): {}",
                    expected,
                    message.id,
                    e.code(),
                    e
                );
                return MessageOutcome::Unavailable;
            }
        };

        if metadata.reference.version_tag != expected.version_tag {
            // The newer version was queued on its own
            debug!(
                "{} was replaced by {}, dropping message {}",
                expected, metadata.reference.version_tag, message.id
            );
            self.delete(message).await;
            return MessageOutcome::Superseded;
        }

        let binding_data = pattern.bind(&expected.path).unwrap_or_default();
        let instance = instances.create(
            &trigger.function_id,
            TriggerInput {
                trigger: metadata.reference,
                content,
                binding_data,
                message_id: message.id.clone(),
                delivery_count: message.delivery_count,
            },
        );

        let started = Instant::now();
        let result = self.executor.execute(instance).await;
        histogram!(names::FUNCTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        if !result.succeeded {
            let reason = result.error.as_deref().unwrap_or("unknown error");
            if message.delivery_count >= self.config.max_delivery_count {
                warn!(
                    "Function {} failed on {} after {} deliveries, message {} goes to the dead-letter queue: {}",
                    trigger.function_id, expected, message.delivery_count, message.id, reason
                );
            } else {
                warn!(
                    "Function {} failed on {} (delivery {}): {}",
                    trigger.function_id, expected, message.delivery_count, reason
                );
            }
            return MessageOutcome::Failed;
        }

        debug!("Function {} completed for {}", trigger.function_id, expected);
        self.delete(message).await;

        if let Some(watcher) = &self.written {
            for object in &result.written_objects {
                watcher.notify(object);
            }
        }
        MessageOutcome::Completed
    }

    async fn delete(&self, message: &QueueMessage) {
        if let Err(e) = self.queue.delete(&message.id, &message.pop_receipt).await {
            // Redelivered later; handlers must tolerate duplicates
            warn!(
                "Failed to delete message {} from {}: {}",
                message.id,
                self.queue.name(),
                e
            );
        }
    }
}

#[async_trait]
impl Listener for QueuePoller {
    async fn start(&self) -> ListenerResult<()> {
        self.polling.start(self.spawn()).await;
        Ok(())
    }

    async fn stop(&self) -> ListenerResult<()> {
        self.polling.stop().await
    }
}

#[async_trait]
impl SharedListener for QueuePoller {
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
    use crate::executor::DefaultInstanceFactory;
    use blobwatch_core::types::{FunctionInstance, FunctionResult, ObjectReference};
    use blobwatch_storage::{MemoryObjectStore, MemoryQueue};
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records invocations; fails while `failing` is set
    #[derive(Default)]
    struct TestExecutor {
        calls: Mutex<Vec<FunctionInstance>>,
        failing: std::sync::atomic::AtomicBool,
        delay: Option<Duration>,
        running: AtomicUsize,
        peak: AtomicUsize,
        writes: Mutex<Vec<ObjectReference>>,
    }

    #[async_trait]
    impl FunctionExecutor for TestExecutor {
        async fn execute(&self, instance: FunctionInstance) -> FunctionResult {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.calls.lock().push(instance);

            if self.failing.load(Ordering::SeqCst) {
                return FunctionResult::failure("boom");
            }
            self.writes
                .lock()
                .iter()
                .cloned()
                .fold(FunctionResult::success(), |result, object| {
                    result.with_written(object)
                })
        }
    }

    #[derive(Default)]
    struct RecordingWatcher {
        seen: Mutex<Vec<ObjectReference>>,
    }

    impl BlobWrittenWatcher for RecordingWatcher {
        fn notify(&self, object: &ObjectReference) {
            self.seen.lock().push(object.clone());
        }
    }

    struct Fixture {
        objects: Arc<MemoryObjectStore>,
        queue: Arc<MemoryQueue>,
        executor: Arc<TestExecutor>,
        watcher: Arc<RecordingWatcher>,
        poller: QueuePoller,
    }

    fn quick() -> QueuePollerConfig {
        QueuePollerConfig {
            batch_size: 4,
            max_in_flight: 2,
            visibility_timeout: Duration::from_secs(60),
            min_poll_interval: Duration::from_millis(10),
            max_poll_interval: Duration::from_millis(50),
            max_delivery_count: 3,
        }
    }

    fn fixture(executor: TestExecutor) -> Fixture {
        let objects = Arc::new(MemoryObjectStore::new());
        let queue = Arc::new(MemoryQueue::new("blobwatch-trigger-host", 3));
        let executor = Arc::new(executor);
        let watcher = Arc::new(RecordingWatcher::default());
        let poller = QueuePoller::new(
            quick(),
            queue.clone(),
            objects.clone(),
            executor.clone(),
            Arc::new(Notify::new()),
            Some(watcher.clone()),
        );
        poller
            .register(
                "f",
                BlobPathPattern::parse("input/{name}.txt").unwrap(),
                Arc::new(DefaultInstanceFactory),
            )
            .unwrap();
        Fixture {
            objects,
            queue,
            executor,
            watcher,
            poller,
        }
    }

    impl Fixture {
        async fn put(&self, path: &str) -> ObjectReference {
            self.objects
                .put("input", path, Bytes::from_static(b"hello"))
                .await
                .unwrap()
        }

        async fn enqueue(&self, function_id: &str, object: &ObjectReference) {
            let body = TriggerMessage::new(function_id, object).to_json().unwrap();
            self.queue.enqueue(body).await.unwrap();
        }

        async fn fetch_one(&self) -> QueueMessage {
            self.queue
                .fetch(1, Duration::from_secs(60))
                .await
                .unwrap()
                .pop()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_success_runs_function_and_deletes() {
        let fx = fixture(TestExecutor::default());
        let object = fx.put("a.txt").await;
        fx.enqueue("f", &object).await;

        let outcome = fx.poller.process(fx.fetch_one().await).await;

        assert_eq!(outcome, MessageOutcome::Completed);
        assert!(fx.queue.is_empty());
        let calls = fx.executor.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].trigger, object);
        assert_eq!(calls[0].content, Bytes::from_static(b"hello"));
        assert_eq!(calls[0].binding_data.get("name").map(String::as_str), Some("a"));
        assert_eq!(calls[0].delivery_count, 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_message() {
        let executor = TestExecutor::default();
        executor.failing.store(true, Ordering::SeqCst);
        let fx = fixture(executor);
        let object = fx.put("a.txt").await;
        fx.enqueue("f", &object).await;

        let outcome = fx.poller.process(fx.fetch_one().await).await;
        assert_eq!(outcome, MessageOutcome::Failed);
        assert_eq!(fx.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_and_orphaned_messages_are_dropped() {
        let fx = fixture(TestExecutor::default());
        let v1 = fx.put("a.txt").await;
        fx.put("a.txt").await;
        fx.enqueue("f", &v1).await;
        assert_eq!(
            fx.poller.process(fx.fetch_one().await).await,
            MessageOutcome::Superseded
        );

        fx.enqueue("f", &ObjectReference::new("input", "gone.txt", "0x1"))
            .await;
        assert_eq!(
            fx.poller.process(fx.fetch_one().await).await,
            MessageOutcome::ObjectMissing
        );

        let current = fx.put("b.txt").await;
        fx.enqueue("unregistered", &current).await;
        assert_eq!(
            fx.poller.process(fx.fetch_one().await).await,
            MessageOutcome::UnknownFunction
        );

        assert!(fx.queue.is_empty());
        assert!(fx.executor.calls.lock().is_empty());
        assert_eq!(fx.poller.stats().dropped, 3);
    }

    #[tokio::test]
    async fn test_suspended_function_keeps_its_messages() {
        let fx = fixture(TestExecutor::default());
        let object = fx.put("a.txt").await;
        fx.enqueue("f", &object).await;

        assert!(fx.poller.suspend("f"));
        assert_eq!(
            fx.poller.process(fx.fetch_one().await).await,
            MessageOutcome::Suspended
        );
        assert_eq!(fx.queue.len(), 1);
        assert!(fx.executor.calls.lock().is_empty());

        assert!(fx.poller.resume("f"));
        fx.enqueue("f", &object).await;
        assert_eq!(
            fx.poller.process(fx.fetch_one().await).await,
            MessageOutcome::Completed
        );
        assert_eq!(fx.executor.calls.lock().len(), 1);
        assert!(!fx.poller.suspend("unregistered"));
    }

    #[tokio::test]
    async fn test_malformed_message_is_left_for_dead_letter() {
        let fx = fixture(TestExecutor::default());
        fx.queue.enqueue("not json".into()).await.unwrap();

        assert_eq!(
            fx.poller.process(fx.fetch_one().await).await,
            MessageOutcome::Malformed
        );
        assert_eq!(fx.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_transient_read_error_keeps_message() {
        let fx = fixture(TestExecutor::default());
        let object = fx.put("a.txt").await;
        fx.enqueue("f", &object).await;
        fx.objects.fail_next_reads("input", "a.txt", 1);

        let outcome = fx.poller.process(fx.fetch_one().await).await;
        assert_eq!(outcome, MessageOutcome::Unavailable);
        assert_eq!(fx.queue.len(), 1);
        assert!(fx.executor.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_written_objects_are_reported() {
        let executor = TestExecutor::default();
        executor
            .writes
            .lock()
            .push(ObjectReference::new("output", "a.out", "0x9"));
        let fx = fixture(executor);
        let object = fx.put("a.txt").await;
        fx.enqueue("f", &object).await;

        fx.poller.process(fx.fetch_one().await).await;
        assert_eq!(
            *fx.watcher.seen.lock(),
            vec![ObjectReference::new("output", "a.out", "0x9")]
        );
    }

    #[tokio::test]
    async fn test_in_flight_is_bounded() {
        let fx = fixture(TestExecutor {
            delay: Some(Duration::from_millis(50)),
            ..TestExecutor::default()
        });
        for i in 0..6 {
            let object = fx.put(&format!("{}.txt", i)).await;
            fx.enqueue("f", &object).await;
        }

        fx.poller.start().await.unwrap();
        for _ in 0..100 {
            if fx.queue.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        fx.poller.stop().await.unwrap();

        assert!(fx.queue.is_empty());
        assert_eq!(fx.executor.calls.lock().len(), 6);
        assert!(fx.executor.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight() {
        let fx = fixture(TestExecutor {
            delay: Some(Duration::from_millis(200)),
            ..TestExecutor::default()
        });
        let object = fx.put("a.txt").await;
        fx.enqueue("f", &object).await;

        fx.poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.executor.running.load(Ordering::SeqCst), 1);
        fx.poller.stop().await.unwrap();

        assert_eq!(fx.executor.calls.lock().len(), 1);
        assert!(fx.queue.is_empty());
    }

    #[tokio::test]
    async fn test_wake_cuts_poll_delay_short() {
        let mut config = quick();
        config.min_poll_interval = Duration::from_secs(30);
        config.max_poll_interval = Duration::from_secs(60);
        let objects = Arc::new(MemoryObjectStore::new());
        let queue = Arc::new(MemoryQueue::new("blobwatch-trigger-host", 3));
        let executor = Arc::new(TestExecutor::default());
        let wake = Arc::new(Notify::new());
        let poller = QueuePoller::new(
            config,
            queue.clone(),
            objects.clone(),
            executor.clone(),
            wake.clone(),
            None,
        );
        poller
            .register("f", BlobPathPattern::parse("input").unwrap(), Arc::new(DefaultInstanceFactory))
            .unwrap();

        poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let object = objects
            .put("input", "a.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        queue
            .enqueue(TriggerMessage::new("f", &object).to_json().unwrap())
            .await
            .unwrap();
        wake.notify_one();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(executor.calls.lock().len(), 1);
        poller.stop().await.unwrap();
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let fx = fixture(TestExecutor::default());
        let err = fx
            .poller
            .register(
                "f",
                BlobPathPattern::parse("input").unwrap(),
                Arc::new(DefaultInstanceFactory),
            )
            .unwrap_err();
        assert!(matches!(err, ListenerError::DuplicateFunction(_)));
        assert!(fx.poller.unregister("f"));
    }
}
