//! Contract of the realtime shared state store every participant talks to.

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::dao::{paths::StorePath, storage::StorageResult};

/// Value of a store path at one moment; `None` when the path is absent.
pub type Snapshot = Option<Value>;

/// Hierarchical publish/subscribe key-value store.
///
/// Implementations must deliver updates of a given path to all of its
/// subscribers in the order the writes were applied.
pub trait SharedStore: Send + Sync {
    /// Point-in-time read of a path.
    fn read(&self, path: &StorePath) -> BoxFuture<'static, StorageResult<Snapshot>>;
    /// Overwrite the whole subtree at `path`; writing `null` deletes it.
    fn write(&self, path: &StorePath, value: Value) -> BoxFuture<'static, StorageResult<()>>;
    /// Apply several path updates atomically; unlisted paths are untouched.
    fn patch(&self, updates: Vec<(StorePath, Value)>) -> BoxFuture<'static, StorageResult<()>>;
    /// Watch a path. The current value is delivered first, then every change
    /// to the path or its subtree.
    fn subscribe(&self, path: &StorePath) -> BoxFuture<'static, StorageResult<Subscription>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Live feed of snapshots for one path. Dropping it unsubscribes.
pub struct Subscription {
    path: StorePath,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap a receiver fed by a store implementation. `on_drop` deregisters
    /// the sender on the store side.
    pub fn new(
        path: StorePath,
        receiver: mpsc::UnboundedReceiver<Snapshot>,
        on_drop: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            path,
            receiver,
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// Wait for the next snapshot. Returns `None` once the store side is gone.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            trace!(path = %self.path, "unsubscribed");
            on_drop();
        }
    }
}
