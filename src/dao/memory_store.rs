//! In-process implementation of [`SharedStore`] backed by a JSON tree.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use crate::dao::{
    paths::StorePath,
    shared_store::{SharedStore, Snapshot, Subscription},
    storage::{StorageError, StorageResult},
};

struct Subscriber {
    path: StorePath,
    tx: mpsc::UnboundedSender<Snapshot>,
}

struct Inner {
    tree: Mutex<Value>,
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    available: AtomicBool,
}

/// Shared-state store living in memory. Cloning yields another handle to the
/// same tree.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(Value::Object(Map::new())),
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(0),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Toggle availability. While unavailable every operation fails with
    /// [`StorageError::Unavailable`] and no notifications are sent.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl Inner {
    fn ensure_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable("memory store is offline"))
        }
    }

    /// Apply the updates and notify every subscriber whose observed value
    /// changed. Runs with the tree lock held so deliveries follow write order.
    async fn apply(&self, updates: Vec<(StorePath, Value)>) -> StorageResult<()> {
        self.ensure_available()?;
        let mut tree = self.tree.lock().await;

        let affected: Vec<(u64, StorePath, Snapshot)> = self
            .subscribers
            .iter()
            .filter(|entry| {
                updates
                    .iter()
                    .any(|(path, _)| path.overlaps(&entry.value().path))
            })
            .map(|entry| {
                let path = entry.value().path.clone();
                let before = lookup(&tree, &path).cloned();
                (*entry.key(), path, before)
            })
            .collect();

        for (path, value) in updates {
            trace!(%path, "store write");
            assign(&mut tree, &path, value);
        }

        for (id, path, before) in affected {
            let after = lookup(&tree, &path).cloned();
            if after == before {
                continue;
            }
            if let Some(subscriber) = self.subscribers.get(&id) {
                let _ = subscriber.tx.send(after);
            }
        }

        Ok(())
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, path: &StorePath) -> BoxFuture<'static, StorageResult<Snapshot>> {
        let inner = self.inner.clone();
        let path = path.clone();
        Box::pin(async move {
            inner.ensure_available()?;
            let tree = inner.tree.lock().await;
            Ok(lookup(&tree, &path).cloned())
        })
    }

    fn write(&self, path: &StorePath, value: Value) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let path = path.clone();
        Box::pin(async move { inner.apply(vec![(path, value)]).await })
    }

    fn patch(&self, updates: Vec<(StorePath, Value)>) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if updates.is_empty() {
                return inner.ensure_available();
            }
            inner.apply(updates).await
        })
    }

    fn subscribe(&self, path: &StorePath) -> BoxFuture<'static, StorageResult<Subscription>> {
        let inner = self.inner.clone();
        let path = path.clone();
        Box::pin(async move {
            inner.ensure_available()?;
            // Holding the tree lock keeps the initial snapshot and the
            // registration in one step relative to writers.
            let tree = inner.tree.lock().await;
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(lookup(&tree, &path).cloned());

            let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
            inner.subscribers.insert(
                id,
                Subscriber {
                    path: path.clone(),
                    tx,
                },
            );
            drop(tree);
            debug!(%path, id, "store subscription registered");

            let weak = Arc::downgrade(&inner);
            Ok(Subscription::new(path, rx, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.remove(&id);
                }
            }))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ensure_available() })
    }
}

fn lookup<'a>(tree: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = tree;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() { None } else { Some(node) }
}

fn assign(tree: &mut Value, path: &StorePath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *tree = if value.is_null() {
            Value::Object(Map::new())
        } else {
            value
        };
        return;
    };

    if value.is_null() {
        let mut node = tree;
        for segment in parents {
            match node.as_object_mut().and_then(|map| map.get_mut(segment)) {
                Some(child) => node = child,
                None => return,
            }
        }
        if let Some(map) = node.as_object_mut() {
            map.remove(last);
        }
        return;
    }

    let mut node = tree;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.clone(), value);
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dao::paths;

    #[tokio::test]
    async fn write_then_read_nested_path() {
        let store = MemoryStore::new();
        store
            .write(&paths::player("Alice"), json!({"score": 0, "answer": ""}))
            .await
            .unwrap();

        let score = store.read(&paths::player_score("Alice")).await.unwrap();
        assert_eq!(score, Some(json!(0)));
        let players = store.read(&paths::players()).await.unwrap();
        assert_eq!(players, Some(json!({"Alice": {"score": 0, "answer": ""}})));
    }

    #[tokio::test]
    async fn writing_null_removes_the_subtree() {
        let store = MemoryStore::new();
        store
            .write(&paths::player("Alice"), json!({"score": 3}))
            .await
            .unwrap();
        store.write(&paths::players(), Value::Null).await.unwrap();
        assert_eq!(store.read(&paths::players()).await.unwrap(), None);
        assert_eq!(store.read(&paths::player("Alice")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn patch_leaves_unlisted_paths_untouched() {
        let store = MemoryStore::new();
        store
            .write(&paths::player("Alice"), json!({"score": 5, "answer": "x"}))
            .await
            .unwrap();
        store
            .patch(vec![
                (paths::player_score("Alice"), json!(15)),
                (paths::game_state(), json!({"phase": "active"})),
            ])
            .await
            .unwrap();

        let alice = store.read(&paths::player("Alice")).await.unwrap();
        assert_eq!(alice, Some(json!({"score": 15, "answer": "x"})));
    }

    #[tokio::test]
    async fn subscribe_delivers_current_value_then_changes_in_order() {
        let store = MemoryStore::new();
        store
            .write(&paths::game_state(), json!({"phase": "waiting"}))
            .await
            .unwrap();

        let mut sub = store.subscribe(&paths::game_state()).await.unwrap();
        assert_eq!(sub.recv().await, Some(Some(json!({"phase": "waiting"}))));

        for phase in ["round_interstitial", "active", "moderating"] {
            store
                .write(&paths::game_state(), json!({"phase": phase}))
                .await
                .unwrap();
        }
        for phase in ["round_interstitial", "active", "moderating"] {
            assert_eq!(sub.recv().await, Some(Some(json!({"phase": phase}))));
        }
    }

    #[tokio::test]
    async fn subtree_changes_reach_ancestor_subscribers_only_when_value_changes() {
        let store = MemoryStore::new();
        let mut players = store.subscribe(&paths::players()).await.unwrap();
        assert_eq!(players.recv().await, Some(None));

        store
            .write(&paths::player_answer("Alice"), json!("paris"))
            .await
            .unwrap();
        assert_eq!(
            players.recv().await,
            Some(Some(json!({"Alice": {"answer": "paris"}})))
        );

        // Unrelated path and identical rewrite do not notify.
        store
            .write(&paths::game_state(), json!({"phase": "active"}))
            .await
            .unwrap();
        store
            .write(&paths::player_answer("Alice"), json!("paris"))
            .await
            .unwrap();
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), players.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_it() {
        let store = MemoryStore::new();
        let sub = store.subscribe(&paths::game_state()).await.unwrap();
        assert_eq!(store.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn offline_store_rejects_every_operation() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.read(&paths::game_state()).await,
            Err(StorageError::Unavailable { .. })
        ));
        assert!(store.write(&paths::game_state(), json!(1)).await.is_err());
        assert!(store.subscribe(&paths::game_state()).await.is_err());
        assert!(store.health_check().await.is_err());

        store.set_available(true);
        assert!(store.health_check().await.is_ok());
    }
}
