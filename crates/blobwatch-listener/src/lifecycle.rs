//! Start/stop bookkeeping for background polling loops

use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ListenerResult;

#[derive(Default)]
struct LoopState {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    users: usize,
}

/// Owns one background task and the token that stops it
///
/// `start`/`stop` drive the loop directly. `acquire`/`release` count users
/// so a loop shared by several listeners runs while any of them is started.
pub(crate) struct PollingLoop {
    name: &'static str,
    state: Mutex<LoopState>,
}

impl PollingLoop {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(LoopState::default()),
        }
    }

    /// Spawn the loop unless it is already running
    pub(crate) async fn start<F, Fut>(&self, spawn: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        Self::spawn_locked(self.name, &mut state, spawn);
    }

    /// Cancel the loop and wait for it to finish its current unit of work
    pub(crate) async fn stop(&self) -> ListenerResult<()> {
        let mut state = self.state.lock().await;
        Self::stop_locked(self.name, &mut state).await
    }

    pub(crate) async fn acquire<F, Fut>(&self, spawn: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        state.users += 1;
        Self::spawn_locked(self.name, &mut state, spawn);
    }

    pub(crate) async fn release(&self) -> ListenerResult<()> {
        let mut state = self.state.lock().await;
        state.users = state.users.saturating_sub(1);
        if state.users > 0 {
            debug!("{} still has {} users", self.name, state.users);
            return Ok(());
        }
        Self::stop_locked(self.name, &mut state).await
    }

    pub(crate) async fn is_running(&self) -> bool {
        self.state.lock().await.task.is_some()
    }

    fn spawn_locked<F, Fut>(name: &'static str, state: &mut LoopState, spawn: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if state.task.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        state.task = Some(tokio::spawn(spawn(cancel.clone())));
        state.cancel = Some(cancel);
        debug!("{} started", name);
    }

    async fn stop_locked(name: &'static str, state: &mut LoopState) -> ListenerResult<()> {
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = state.task.take() {
            task.await?;
            debug!("{} stopped", name);
        }
        Ok(())
    }
}
