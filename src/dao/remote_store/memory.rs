//! In-process [`RemoteStore`] used by tests and by servers running without a remote backend.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, DashSet};
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use crate::dao::{
    remote_store::{RemoteStore, Subscription, SubscriptionEvent, SubscriptionHandle, tree},
    storage::{StoreError, StoreResult},
};

/// Failures the in-memory backend can simulate.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("memory store is offline")]
    Offline,
}

struct Subscriber {
    path: String,
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

#[derive(Default)]
struct Inner {
    root: Mutex<Value>,
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    denied: DashSet<String>,
    offline: AtomicBool,
}

/// Shared JSON tree with per-path subscribers. Clones share the same tree.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every operation touching `path` (or its descendants) with a permission error.
    pub fn deny(&self, path: &str) {
        self.inner.denied.insert(path.to_string());
    }

    /// Lift a previous [`MemoryStore::deny`].
    pub fn allow(&self, path: &str) {
        self.inner.denied.remove(path);
    }

    /// Toggle simulated transport failure for reads, writes and health checks.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Push an error to every subscriber of exactly `path`.
    pub fn inject_subscription_error(&self, path: &str, error: StoreError) {
        for entry in self.inner.subscribers.iter() {
            if entry.path == path {
                let _ = entry.tx.send(Err(error.clone()));
            }
        }
    }

    /// End the update stream of every subscriber of exactly `path`, as a dropped connection
    /// would.
    pub fn close_subscriptions(&self, path: &str) {
        self.inner
            .subscribers
            .retain(|_, subscriber| subscriber.path != path);
    }

    /// Number of live subscriptions, all paths included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl Inner {
    fn check(&self, path: &str) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(
                format!("cannot reach `{path}`"),
                MemoryStoreError::Offline,
            ));
        }
        let denied = self
            .denied
            .iter()
            .any(|entry| tree::paths_overlap(entry.key(), path));
        if denied {
            return Err(StoreError::permission_denied(path));
        }
        Ok(())
    }

    /// Apply `updates` atomically and notify subscribers whose value changed.
    async fn apply(&self, updates: BTreeMap<String, Value>) -> StoreResult<()> {
        for path in updates.keys() {
            self.check(path)?;
        }

        let mut root = self.root.lock().await;
        let before = root.clone();
        for (path, value) in &updates {
            tree::set(&mut root, path, value.clone());
        }

        self.subscribers.retain(|_, subscriber| {
            let touched = updates
                .keys()
                .any(|path| tree::paths_overlap(path, &subscriber.path));
            if !touched {
                return true;
            }
            let old = tree::get(&before, &subscriber.path);
            let new = tree::get(&root, &subscriber.path);
            if old == new {
                return true;
            }
            subscriber.tx.send(Ok(new.cloned())).is_ok()
        });

        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    fn read(&self, path: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        let inner = self.inner.clone();
        let path = path.to_string();
        Box::pin(async move {
            inner.check(&path)?;
            let root = inner.root.lock().await;
            Ok(tree::get(&root, &path).cloned())
        })
    }

    fn write(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let updates = BTreeMap::from([(path.to_string(), value)]);
        Box::pin(async move { inner.apply(updates).await })
    }

    fn update(&self, updates: BTreeMap<String, Value>) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.apply(updates).await })
    }

    fn subscribe(&self, path: &str) -> BoxFuture<'static, StoreResult<Subscription>> {
        let inner = self.inner.clone();
        let path = path.to_string();
        Box::pin(async move {
            inner.check(&path)?;
            let (tx, updates) = mpsc::unbounded_channel();
            let id = inner.next_id.fetch_add(1, Ordering::SeqCst);

            {
                // Register under the tree lock so no write slips between the initial value and
                // the first notification.
                let root = inner.root.lock().await;
                let _ = tx.send(Ok(tree::get(&root, &path).cloned()));
                inner.subscribers.insert(
                    id,
                    Subscriber {
                        path: path.clone(),
                        tx,
                    },
                );
            }
            debug!(%path, id, "memory subscription attached");

            let weak: Weak<Inner> = Arc::downgrade(&inner);
            let handle = SubscriptionHandle::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.remove(&id);
                }
            });

            Ok(Subscription { updates, handle })
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if inner.offline.load(Ordering::SeqCst) {
                return Err(StoreError::unavailable(
                    "health check failed".into(),
                    MemoryStoreError::Offline,
                ));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_initial_and_changed_values() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("teams").await.unwrap();
        assert_eq!(sub.updates.recv().await.unwrap().unwrap(), None);

        store.write("teams/t1", json!({"name": "Owls"})).await.unwrap();
        let value = sub.updates.recv().await.unwrap().unwrap();
        assert_eq!(value, Some(json!({"t1": {"name": "Owls"}})));

        // Writes elsewhere do not wake this subscriber.
        store.write("config/maxTeams", json!(3)).await.unwrap();
        assert!(sub.updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn multi_path_update_is_delivered_as_one_snapshot() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("game-state").await.unwrap();
        let _ = sub.updates.recv().await;

        store
            .update(BTreeMap::from([
                ("game-state/currentQuestionNumber".to_string(), json!(2)),
                ("game-state/answerRevealed".to_string(), json!(false)),
                ("game-state/questionVisible".to_string(), json!(true)),
            ]))
            .await
            .unwrap();

        let value = sub.updates.recv().await.unwrap().unwrap().unwrap();
        assert_eq!(value["currentQuestionNumber"], 2);
        assert_eq!(value["questionVisible"], true);
        assert!(sub.updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("config").await.unwrap();
        assert_eq!(store.subscriber_count(), 1);
        sub.handle.unsubscribe();
        sub.handle.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
        assert!(!sub.handle.is_active());
    }

    #[tokio::test]
    async fn denied_paths_report_permission_errors() {
        let store = MemoryStore::new();
        store.deny("config");
        let err = store.write("config", json!({"maxTeams": 1})).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert!(store.read("teams").await.unwrap().is_none());
    }
}
