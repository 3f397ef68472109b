//! Listener lifecycle and composition

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::error::ListenerResult;

/// Something that can be started and stopped by the host
#[async_trait]
pub trait Listener: Send + Sync {
    async fn start(&self) -> ListenerResult<()>;

    /// Stop and wait for in-progress work; stopping twice is a no-op
    async fn stop(&self) -> ListenerResult<()>;
}

/// Groups listeners behind a single start/stop
pub struct CompositeListener {
    listeners: Vec<Arc<dyn Listener>>,
}

impl CompositeListener {
    pub fn new(listeners: Vec<Arc<dyn Listener>>) -> Self {
        Self { listeners }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[async_trait]
impl Listener for CompositeListener {
    /// Start children in order; on failure, stop the ones already started
    async fn start(&self) -> ListenerResult<()> {
        for (started, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.start().await {
                for earlier in self.listeners[..started].iter().rev() {
                    if let Err(stop_error) = earlier.stop().await {
                        error!("Failed to stop listener after start failure: {}", stop_error);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop every child even if some fail, returning the first error
    async fn stop(&self) -> ListenerResult<()> {
        let mut first_error = None;
        for listener in &self.listeners {
            if let Err(e) = listener.stop().await {
                error!("Failed to stop listener: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListenerError;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
        fail_stop: bool,
    }

    #[async_trait]
    impl Listener for Recorder {
        async fn start(&self) -> ListenerResult<()> {
            self.log.lock().push(format!("start {}", self.name));
            if self.fail_start {
                return Err(ListenerError::Internal(format!("{} cannot start", self.name)));
            }
            Ok(())
        }

        async fn stop(&self) -> ListenerResult<()> {
            self.log.lock().push(format!("stop {}", self.name));
            if self.fail_stop {
                return Err(ListenerError::Internal(format!("{} cannot stop", self.name)));
            }
            Ok(())
        }
    }

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        fail_start: bool,
        fail_stop: bool,
    ) -> Arc<dyn Listener> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            fail_start,
            fail_stop,
        })
    }

    #[tokio::test]
    async fn test_starts_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composite = CompositeListener::new(vec![
            recorder("a", &log, false, false),
            recorder("b", &log, false, false),
        ]);

        composite.start().await.unwrap();
        composite.stop().await.unwrap();
        assert_eq!(*log.lock(), vec!["start a", "start b", "stop a", "stop b"]);
    }

    #[tokio::test]
    async fn test_start_failure_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composite = CompositeListener::new(vec![
            recorder("a", &log, true, false),
            recorder("b", &log, false, false),
        ]);

        assert!(composite.start().await.is_err());
        assert_eq!(*log.lock(), vec!["start a"]);
    }

    #[tokio::test]
    async fn test_start_failure_stops_started_children() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composite = CompositeListener::new(vec![
            recorder("a", &log, false, false),
            recorder("b", &log, false, true),
            recorder("c", &log, true, false),
            recorder("d", &log, false, false),
        ]);

        let err = composite.start().await.unwrap_err();
        assert!(err.to_string().contains("c cannot start"));
        assert_eq!(
            *log.lock(),
            vec!["start a", "start b", "start c", "stop b", "stop a"]
        );
    }

    #[tokio::test]
    async fn test_stop_reaches_every_child() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composite = CompositeListener::new(vec![
            recorder("a", &log, false, true),
            recorder("b", &log, false, true),
        ]);

        let err = composite.stop().await.unwrap_err();
        assert!(err.to_string().contains("a cannot stop"));
        assert_eq!(*log.lock(), vec!["stop a", "stop b"]);
    }
}
