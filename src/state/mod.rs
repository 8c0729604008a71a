pub mod game;
pub mod lifeline_timer;
mod sse;
pub mod state_machine;
pub mod sync;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::QuizConfig,
    dao::remote_store::RemoteStore,
    error::ServiceError,
    services::{auth::AuthSession, question_bank::QuestionBank},
};

pub use self::sse::SseHub;
use self::{lifeline_timer::TimerHandle, sse::SseState, sync::SyncLayer};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Wall-clock reading in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Central application state: the store handle, the synchronized snapshot and the SSE hubs.
pub struct AppState {
    store: RwLock<Option<Arc<dyn RemoteStore>>>,
    sync: SyncLayer,
    config: QuizConfig,
    question_bank: Arc<dyn QuestionBank>,
    auth: Arc<dyn AuthSession>,
    sse: SseState,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
    lifeline_timer: Mutex<Option<TimerHandle>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a store is installed.
    pub fn new(
        config: QuizConfig,
        question_bank: Arc<dyn QuestionBank>,
        auth: Arc<dyn AuthSession>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            sync: SyncLayer::new(),
            config,
            question_bank,
            auth,
            sse: SseState::with_capacity(64),
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
            lifeline_timer: Mutex::new(None),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn RemoteStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn RemoteStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn RemoteStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    pub fn sync(&self) -> &SyncLayer {
        &self.sync
    }

    /// Authoritative quiz configuration.
    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn question_bank(&self) -> &dyn QuestionBank {
        self.question_bank.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthSession {
        self.auth.as_ref()
    }

    /// Broadcast hub used for the display SSE stream.
    pub fn display_sse(&self) -> &SseHub {
        self.sse.display()
    }

    /// Broadcast hub used for the host SSE stream.
    pub fn host_sse(&self) -> &SseHub {
        self.sse.host()
    }

    /// Slot holding the phone-a-friend countdown, if one was started.
    pub fn lifeline_timer(&self) -> &Mutex<Option<TimerHandle>> {
        &self.lifeline_timer
    }

    pub(crate) fn transition_gate(&self) -> &Mutex<()> {
        &self.transition_gate
    }

    pub(crate) fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }
}
