//! Host-wide shared listeners
//!
//! Discovery and queue polling run once per host no matter how many
//! functions register. The registry hands out one instance per
//! `(type, identity)`, and [`SharedListenerHandle`] lets each function's
//! composite listener start and stop its share of it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::composite::Listener;
use crate::error::{ListenerError, ListenerResult};

type SharedEntry = Arc<dyn Any + Send + Sync>;

/// One instance per type and identity, created on first request
#[derive(Default)]
pub struct SharedListenerRegistry {
    entries: Mutex<HashMap<(TypeId, String), SharedEntry>>,
}

impl SharedListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the instance for `(T, identity)`, creating it with `factory` if absent
    ///
    /// The factory runs at most once per key, under the registry lock. A
    /// failing factory leaves nothing cached.
    pub fn get_or_create<T, F>(&self, identity: &str, factory: F) -> ListenerResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> ListenerResult<T>,
    {
        let key = (TypeId::of::<T>(), identity.to_string());
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(&key) {
            return Arc::clone(entry)
                .downcast::<T>()
                .map_err(|_| ListenerError::SharedTypeMismatch(identity.to_string()));
        }

        let instance = Arc::new(factory()?);
        let entry: SharedEntry = instance.clone();
        entries.insert(key, entry);
        debug!(
            "Created shared {} for '{}'",
            std::any::type_name::<T>(),
            identity
        );
        Ok(instance)
    }

    pub fn get<T: Any + Send + Sync>(&self, identity: &str) -> Option<Arc<T>> {
        let key = (TypeId::of::<T>(), identity.to_string());
        self.entries
            .lock()
            .get(&key)
            .and_then(|entry| Arc::clone(entry).downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A listener whose background work is reference counted across users
#[async_trait]
pub trait SharedListener: Send + Sync {
    /// Register a user, starting the work for the first one
    async fn acquire(&self) -> ListenerResult<()>;

    /// Drop a user, stopping the work after the last one
    async fn release(&self) -> ListenerResult<()>;
}

/// One function's share of a [`SharedListener`]
pub struct SharedListenerHandle<T: SharedListener> {
    shared: Arc<T>,
    started: AtomicBool,
}

impl<T: SharedListener> SharedListenerHandle<T> {
    pub fn new(shared: Arc<T>) -> Self {
        Self {
            shared,
            started: AtomicBool::new(false),
        }
    }

    pub fn shared(&self) -> &Arc<T> {
        &self.shared
    }
}

#[async_trait]
impl<T: SharedListener + 'static> Listener for SharedListenerHandle<T> {
    async fn start(&self) -> ListenerResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.shared.acquire().await {
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    async fn stop(&self) -> ListenerResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.release().await
    }
}
