//! Mirrors every root partition of the store into one locally observable snapshot.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    config::QuizConfig,
    dao::{
        models::{
            self, AllowedHostsEntity, QuestionSetsEntity, TeamsEntity, question_sets_from_entity,
            teams_from_entity,
        },
        remote_store::{Partition, RemoteStore, Subscription, SubscriptionEvent, SubscriptionHandle},
        storage::{StoreError, StoreResult},
    },
    state::game::{GameState, PrizeStructure, QuestionSetId, QuestionSetMetadata, Team, TeamId},
};

/// Aggregate of the last value delivered by each partition.
#[derive(Debug, Clone, Default)]
pub struct SyncedSnapshot {
    /// `None` until a match was ever written.
    pub game: Option<GameState>,
    pub teams: IndexMap<TeamId, Team>,
    pub question_sets: IndexMap<QuestionSetId, QuestionSetMetadata>,
    pub prize_structure: Option<PrizeStructure>,
    /// Remote mirror of the quiz config.
    pub config: Option<QuizConfig>,
    /// Host identities allowed to drive the match.
    pub allowed_hosts: Vec<String>,
    /// Partitions that delivered at least once since the last attach.
    pub loaded: BTreeSet<Partition>,
    /// Last error reported per partition; cleared by the next good delivery.
    pub errors: BTreeMap<Partition, String>,
    /// Bumped on every attach and teardown. Deliveries from older generations are dropped.
    pub generation: u64,
}

impl SyncedSnapshot {
    /// Whether some partition has not delivered yet.
    pub fn is_loading(&self) -> bool {
        self.pending().next().is_some()
    }

    /// Partitions that have not delivered yet.
    pub fn pending(&self) -> impl Iterator<Item = Partition> + '_ {
        Partition::ALL
            .into_iter()
            .filter(|partition| !self.loaded.contains(partition))
    }

    /// Game state, or the `not-started` default when the partition is absent.
    pub fn game_or_default(&self) -> GameState {
        self.game.clone().unwrap_or_default()
    }

    /// Fold one delivery into the aggregate.
    fn apply(&mut self, partition: Partition, event: SubscriptionEvent) {
        match event.and_then(|value| self.store_value(partition, value)) {
            Ok(()) => {
                self.errors.remove(&partition);
                self.loaded.insert(partition);
            }
            Err(err @ StoreError::PermissionDenied { .. }) => {
                // Denied reads behave like an absent value so loading can finish.
                let _ = self.store_value(partition, None);
                self.errors.insert(partition, err.to_string());
                self.loaded.insert(partition);
            }
            Err(err @ StoreError::Malformed { .. }) => {
                warn!(partition = partition.path(), error = %err, "undecodable partition value");
                self.errors.insert(partition, err.to_string());
                self.loaded.insert(partition);
            }
            Err(err) => {
                warn!(partition = partition.path(), error = %err, "partition subscription error");
                self.errors.insert(partition, err.to_string());
            }
        }
    }

    fn store_value(
        &mut self,
        partition: Partition,
        value: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        match partition {
            Partition::GameState => self.game = models::decode(partition, value)?,
            Partition::Teams => {
                self.teams = models::decode::<TeamsEntity>(partition, value)?
                    .map(teams_from_entity)
                    .unwrap_or_default();
            }
            Partition::QuestionSets => {
                self.question_sets = models::decode::<QuestionSetsEntity>(partition, value)?
                    .map(question_sets_from_entity)
                    .unwrap_or_default();
            }
            Partition::PrizeStructure => {
                self.prize_structure = models::decode(partition, value)?;
            }
            Partition::Config => self.config = models::decode(partition, value)?,
            Partition::AllowedHosts => {
                self.allowed_hosts = models::decode::<AllowedHostsEntity>(partition, value)?
                    .map(AllowedHostsEntity::into_hosts)
                    .unwrap_or_default();
            }
        }
        Ok(())
    }
}

const RESUBSCRIBE_INITIAL_DELAY: Duration = Duration::from_millis(500);
const RESUBSCRIBE_MAX_DELAY: Duration = Duration::from_secs(10);

type Handles = Arc<DashMap<Partition, SubscriptionHandle>>;

/// Owns one subscription per partition and publishes the aggregate on a watch channel.
///
/// A partition whose update stream ends is re-subscribed on its own, with backoff, while its
/// siblings keep delivering.
pub struct SyncLayer {
    snapshot: watch::Sender<SyncedSnapshot>,
    handles: Handles,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for SyncLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncLayer {
    /// Detached layer; every partition reports loading until [`SyncLayer::attach`].
    pub fn new() -> Self {
        let (snapshot, _rx) = watch::channel(SyncedSnapshot::default());
        Self {
            snapshot,
            handles: Arc::new(DashMap::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Receiver notified on every change of the aggregate.
    pub fn subscribe(&self) -> watch::Receiver<SyncedSnapshot> {
        self.snapshot.subscribe()
    }

    /// Latest aggregate.
    pub fn current(&self) -> SyncedSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait until every partition delivered once since the last attach.
    pub async fn loaded(&self) -> SyncedSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|snapshot| !snapshot.is_loading()).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.current(),
        }
    }

    /// Subscribe to every partition, tearing down any previous attachment first.
    ///
    /// A partition that cannot be subscribed is recorded as an error and retried in the
    /// background; its siblings still attach.
    pub async fn attach(&self, store: Arc<dyn RemoteStore>) {
        let mut tasks = self.tasks.lock().await;
        self.detach(&mut tasks);

        let generation = self.snapshot.borrow().generation;
        for partition in Partition::ALL {
            let updates = match store.subscribe(partition.path()).await {
                Ok(Subscription { updates, handle }) => {
                    self.handles.insert(partition, handle);
                    Some(updates)
                }
                Err(err) => {
                    warn!(partition = partition.path(), error = %err, "failed to subscribe");
                    self.snapshot.send_modify(|snapshot| snapshot.apply(partition, Err(err)));
                    None
                }
            };
            let forwarder = Forwarder {
                partition,
                store: store.clone(),
                snapshot: self.snapshot.clone(),
                handles: self.handles.clone(),
                generation,
            };
            tasks.push(tokio::spawn(forwarder.run(updates)));
        }
        info!(generation, "synchronization layer attached");
    }

    /// Re-attach after a connectivity loss.
    pub async fn reconnect(&self, store: Arc<dyn RemoteStore>) {
        debug!("reconnecting synchronization layer");
        self.attach(store).await;
    }

    /// Drop every subscription. Safe to call repeatedly.
    pub async fn teardown(&self) {
        let mut tasks = self.tasks.lock().await;
        self.detach(&mut tasks);
    }

    fn detach(&self, tasks: &mut Vec<JoinHandle<()>>) {
        // Bumping the generation under the watch lock fences out in-flight deliveries and
        // late re-subscriptions.
        self.snapshot.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.loaded.clear();
            snapshot.errors.clear();
        });
        // Dropping a handle unsubscribes it.
        self.handles.clear();
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Pumps one partition into the aggregate for a single attach generation.
struct Forwarder {
    partition: Partition,
    store: Arc<dyn RemoteStore>,
    snapshot: watch::Sender<SyncedSnapshot>,
    handles: Handles,
    generation: u64,
}

impl Forwarder {
    async fn run(self, mut updates: Option<mpsc::UnboundedReceiver<SubscriptionEvent>>) {
        let mut delay = RESUBSCRIBE_INITIAL_DELAY;
        loop {
            if let Some(mut receiver) = updates.take() {
                while let Some(event) = receiver.recv().await {
                    let delivered = event.is_ok();
                    if !self.deliver(event) {
                        debug!(partition = self.partition.path(), "partition forwarder stopped");
                        return;
                    }
                    if delivered {
                        delay = RESUBSCRIBE_INITIAL_DELAY;
                    }
                }
                warn!(partition = self.partition.path(), "partition stream ended; re-subscribing");
            }

            sleep(delay).await;
            delay = (delay * 2).min(RESUBSCRIBE_MAX_DELAY);
            if self.is_stale() {
                return;
            }

            match self.store.subscribe(self.partition.path()).await {
                Ok(Subscription { updates: next, handle }) => {
                    if !self.install(handle) {
                        return;
                    }
                    debug!(partition = self.partition.path(), "partition re-subscribed");
                    updates = Some(next);
                }
                Err(err) => {
                    warn!(partition = self.partition.path(), error = %err, "re-subscribe failed");
                    if !self.deliver(Err(err)) {
                        return;
                    }
                }
            }
        }
    }

    /// Fold `event` into the aggregate. `false` once this generation was torn down.
    fn deliver(&self, event: SubscriptionEvent) -> bool {
        let mut current_generation = true;
        self.snapshot.send_if_modified(|current| {
            if current.generation != self.generation {
                current_generation = false;
                return false;
            }
            current.apply(self.partition, event);
            true
        });
        current_generation
    }

    /// Keep `handle` unless this generation was torn down meanwhile.
    fn install(&self, handle: SubscriptionHandle) -> bool {
        let mut installed = false;
        self.snapshot.send_if_modified(|current| {
            if current.generation == self.generation {
                self.handles.insert(self.partition, handle);
                installed = true;
            }
            false
        });
        installed
    }

    fn is_stale(&self) -> bool {
        self.snapshot.borrow().generation != self.generation
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dao::remote_store::memory::MemoryStore;

    async fn attached(store: &MemoryStore) -> SyncLayer {
        let layer = SyncLayer::new();
        layer.attach(Arc::new(store.clone())).await;
        layer
    }

    #[tokio::test]
    async fn loading_ends_once_every_partition_delivered() {
        let store = MemoryStore::new();
        let layer = SyncLayer::new();
        assert!(layer.current().is_loading());

        layer.attach(Arc::new(store.clone())).await;
        let snapshot = layer.loaded().await;
        assert!(!snapshot.is_loading());
        assert!(snapshot.game.is_none());
        assert!(snapshot.teams.is_empty());
    }

    #[tokio::test]
    async fn writes_are_republished() {
        let store = MemoryStore::new();
        let layer = attached(&store).await;
        let mut rx = layer.subscribe();
        layer.loaded().await;

        store
            .write("teams/t1", json!({"name": "Owls", "createdAt": 1}))
            .await
            .unwrap();
        let snapshot = rx
            .wait_for(|snapshot| snapshot.teams.contains_key("t1"))
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.teams["t1"].name, "Owls");
    }

    #[tokio::test]
    async fn permission_denied_counts_as_delivered() {
        let store = MemoryStore::new();
        store.deny("allowed-hosts");
        let layer = attached(&store).await;

        let snapshot = layer.loaded().await;
        assert!(snapshot.allowed_hosts.is_empty());
        assert!(snapshot.errors.contains_key(&Partition::AllowedHosts));
    }

    #[tokio::test]
    async fn partition_errors_do_not_stop_siblings() {
        let store = MemoryStore::new();
        let layer = attached(&store).await;
        let mut rx = layer.subscribe();
        layer.loaded().await;

        store.inject_subscription_error(
            "game-state",
            StoreError::unavailable("stream reset".into(), std::fmt::Error),
        );
        store.write("prize-structure", json!({"values": [1, 2]})).await.unwrap();

        let snapshot = rx
            .wait_for(|snapshot| {
                snapshot.prize_structure.is_some()
                    && snapshot.errors.contains_key(&Partition::GameState)
            })
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.prize_structure.unwrap().values, vec![1, 2]);
    }

    #[tokio::test]
    async fn teardown_is_idempotent_and_fences_deliveries() {
        let store = MemoryStore::new();
        let layer = attached(&store).await;
        layer.loaded().await;
        assert_eq!(store.subscriber_count(), Partition::ALL.len());

        layer.teardown().await;
        layer.teardown().await;
        assert_eq!(store.subscriber_count(), 0);

        let generation = layer.current().generation;
        store.write("teams/t9", json!({"name": "Late"})).await.unwrap();
        tokio::task::yield_now().await;
        let snapshot = layer.current();
        assert!(!snapshot.teams.contains_key("t9"));
        assert_eq!(snapshot.generation, generation);
        assert!(snapshot.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn ended_stream_is_resubscribed_without_touching_siblings() {
        let store = MemoryStore::new();
        let layer = attached(&store).await;
        let mut rx = layer.subscribe();
        layer.loaded().await;

        store.close_subscriptions("teams");
        assert_eq!(store.subscriber_count(), Partition::ALL.len() - 1);
        store
            .write("teams/t1", json!({"name": "Owls", "createdAt": 1}))
            .await
            .unwrap();
        store.write("prize-structure", json!({"values": [5]})).await.unwrap();

        let snapshot = rx
            .wait_for(|snapshot| {
                snapshot.teams.contains_key("t1") && snapshot.prize_structure.is_some()
            })
            .await
            .unwrap()
            .clone();
        assert!(!snapshot.is_loading());
        assert_eq!(store.subscriber_count(), Partition::ALL.len());

        // The new subscription keeps delivering.
        store
            .write("teams/t2", json!({"name": "Larks", "createdAt": 2}))
            .await
            .unwrap();
        rx.wait_for(|snapshot| snapshot.teams.contains_key("t2"))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_pending_resubscription() {
        let store = MemoryStore::new();
        let layer = attached(&store).await;
        layer.loaded().await;

        store.close_subscriptions("config");
        layer.teardown().await;
        tokio::time::sleep(RESUBSCRIBE_MAX_DELAY).await;
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn reconnect_replaces_existing_subscriptions() {
        let store = MemoryStore::new();
        let layer = attached(&store).await;
        layer.loaded().await;

        layer.reconnect(Arc::new(store.clone())).await;
        let snapshot = layer.loaded().await;
        assert_eq!(store.subscriber_count(), Partition::ALL.len());
        assert!(!snapshot.is_loading());
    }
}
