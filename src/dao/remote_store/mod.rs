#[cfg(feature = "firebase-store")]
pub mod firebase;
pub mod memory;
pub mod tree;

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::dao::storage::StoreResult;

/// Top-level addressable sections of the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    GameState,
    Teams,
    QuestionSets,
    PrizeStructure,
    Config,
    AllowedHosts,
}

impl Partition {
    /// Every root partition, in subscription order.
    pub const ALL: [Partition; 6] = [
        Partition::GameState,
        Partition::Teams,
        Partition::QuestionSets,
        Partition::PrizeStructure,
        Partition::Config,
        Partition::AllowedHosts,
    ];

    /// Root path of the partition inside the store.
    pub fn path(self) -> &'static str {
        match self {
            Partition::GameState => "game-state",
            Partition::Teams => "teams",
            Partition::QuestionSets => "question-sets",
            Partition::PrizeStructure => "prize-structure",
            Partition::Config => "config",
            Partition::AllowedHosts => "allowed-hosts",
        }
    }

    /// Path of `child` below this partition.
    pub fn child(self, child: &str) -> String {
        format!("{}/{}", self.path(), child.trim_matches('/'))
    }
}

/// A full-value notification: the current value at the subscribed path, `None` when absent.
pub type SubscriptionEvent = StoreResult<Option<Value>>;

/// Live subscription returned by [`RemoteStore::subscribe`].
pub struct Subscription {
    pub updates: mpsc::UnboundedReceiver<SubscriptionEvent>,
    pub handle: SubscriptionHandle,
}

/// Cancellation handle for a subscription. Unsubscribing is idempotent and also happens on drop.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionHandle {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Detach from the store. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Path-addressable key-value store with pub/sub, shared by every observer of the match.
///
/// Writing `Value::Null` deletes the path.
pub trait RemoteStore: Send + Sync {
    fn read(&self, path: &str) -> BoxFuture<'static, StoreResult<Option<Value>>>;
    fn write(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>>;
    /// Apply every `path -> value` pair atomically.
    fn update(&self, updates: BTreeMap<String, Value>) -> BoxFuture<'static, StoreResult<()>>;
    fn subscribe(&self, path: &str) -> BoxFuture<'static, StoreResult<Subscription>>;
    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>>;
}
