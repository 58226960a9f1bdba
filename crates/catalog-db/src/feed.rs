// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use catalog_app::Document;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub type FeedCallback = Box<dyn FnMut(&[Document]) + Send>;

type SharedCallback = Arc<Mutex<FeedCallback>>;

struct Listener {
    id: u64,
    collection: String,
    callback: SharedCallback,
}

#[derive(Default)]
pub(crate) struct FeedRegistry {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl FeedRegistry {
    pub(crate) fn register(&mut self, collection: &str, callback: FeedCallback) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        self.listeners.push(Listener {
            id,
            collection: collection.to_owned(),
            callback: Arc::new(Mutex::new(callback)),
        });
        id
    }

    fn unregister(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        self.listeners.len() != before
    }

    pub(crate) fn has_listeners(&self, collection: &str) -> bool {
        self.listeners
            .iter()
            .any(|listener| listener.collection == collection)
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Callbacks of every listener matching `(id, collection)`, to be run
    /// with [`deliver`] once the registry lock is released.
    pub(crate) fn listeners_where(
        &self,
        mut matches: impl FnMut(u64, &str) -> bool,
    ) -> Vec<SharedCallback> {
        self.listeners
            .iter()
            .filter(|listener| matches(listener.id, &listener.collection))
            .map(|listener| Arc::clone(&listener.callback))
            .collect()
    }
}

/// Runs each callback with the snapshot. Must be called without holding the
/// registry lock so callbacks may drop their own handles.
pub(crate) fn deliver(callbacks: &[SharedCallback], documents: &[Document]) -> usize {
    for callback in callbacks {
        let mut callback = match callback.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (*callback)(documents);
    }
    callbacks.len()
}

pub(crate) fn lock(registry: &Mutex<FeedRegistry>) -> MutexGuard<'_, FeedRegistry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Live subscription to one collection. Dropping the handle unregisters the
/// callback; `unsubscribe` does the same explicitly.
pub struct FeedHandle {
    id: u64,
    collection: String,
    registry: Weak<Mutex<FeedRegistry>>,
}

impl FeedHandle {
    pub(crate) fn new(id: u64, collection: &str, registry: &Arc<Mutex<FeedRegistry>>) -> Self {
        Self {
            id,
            collection: collection.to_owned(),
            registry: Arc::downgrade(registry),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_active(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let guard = lock(&registry);
        guard.listeners.iter().any(|listener| listener.id == self.id)
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = lock(&registry).unregister(self.id);
        if removed {
            tracing::info!(collection = %self.collection, feed = self.id, "feed closed");
        }
    }
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle")
            .field("id", &self.id)
            .field("collection", &self.collection)
            .finish()
    }
}
