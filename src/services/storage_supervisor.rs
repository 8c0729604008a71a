use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{remote_store::RemoteStore, storage::StoreError},
    services::config_sync,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the store, attach the synchronization layer and keep the shared state in
/// degraded mode while the store is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RemoteStore>, StoreError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                install(&state, store.clone()).await;
                info!("store connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, &store).await;

                state.clear_store().await;
                state.sync().teardown().await;
                warn!("exhausted store reconnect attempts; staying in degraded mode");

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

async fn install(state: &SharedState, store: Arc<dyn RemoteStore>) {
    state.install_store(store.clone()).await;
    state.sync().attach(store.clone()).await;

    match config_sync::sync_config(store.as_ref(), state.auth(), state.config()).await {
        Ok(outcome) => info!(?outcome, "config reconciled"),
        Err(err) => warn!(error = %err, "config reconciliation failed"),
    }
}

/// Poll health until the store stays unreachable for [`MAX_RECONNECT_ATTEMPTS`] probes.
async fn supervise(state: &SharedState, store: &Arc<dyn RemoteStore>) {
    loop {
        if store.health_check().await.is_ok() {
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut attempt = 0;
        let mut retry_delay = INITIAL_DELAY;
        let mut recovered = false;

        while attempt < MAX_RECONNECT_ATTEMPTS {
            match store.health_check().await {
                Ok(()) => {
                    recovered = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %err,
                            "store health check failed; entering degraded mode"
                        );
                        state.update_degraded(true);
                    } else {
                        warn!(attempt, error = %err, "store health probe failed");
                    }
                    attempt += 1;
                    sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !recovered {
            return;
        }

        info!("store healthy again; re-attaching subscriptions");
        state.sync().reconnect(store.clone()).await;
        state.update_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::QuizConfig,
        dao::remote_store::memory::MemoryStore,
        services::{auth::StaticAuth, question_bank::LocalQuestionBank},
        state::AppState,
    };

    #[tokio::test]
    async fn connecting_leaves_degraded_mode_and_loads_every_partition() {
        let state = AppState::new(
            QuizConfig::default(),
            Arc::new(LocalQuestionBank::default()),
            Arc::new(StaticAuth::new(Some("host-1".into()))),
        );
        let store = MemoryStore::new();
        let shared: Arc<dyn RemoteStore> = Arc::new(store.clone());

        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = shared.clone();
            async move { Ok::<_, StoreError>(store) }
        }));

        let snapshot = tokio::time::timeout(Duration::from_secs(2), state.sync().loaded())
            .await
            .unwrap();
        assert!(!state.is_degraded());
        assert!(!snapshot.is_loading());

        // The reconciler initialized the remote mirror.
        let remote = store.read("config").await.unwrap();
        assert!(remote.is_some());

        supervisor.abort();
    }
}
