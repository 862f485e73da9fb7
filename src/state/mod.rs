//! Process-wide state container.
//!
//! Everything in here is process-local: aggregation buffers, merges, side flows and the
//! pending-question cache are created at start-up, evicted by the sweeper, and lost on
//! shutdown. Running several instances behind one bot would split an owner's flow across
//! processes; that deployment needs these maps moved to a shared keyed cache with TTL
//! while keeping the one-slot-per-owner contract.

pub mod aggregator;
pub mod continuation;
pub mod long_text;
pub mod pending;
pub mod side_flow;

use std::{sync::Arc, time::Instant};

use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::draft_store::DraftStore,
    error::ServiceError,
    services::{roles::RoleChecker, transport::Transport},
};

use self::{
    aggregator::InputAggregator,
    continuation::ContinuationHeuristic,
    long_text::LongTextMerger,
    pending::PendingQuestions,
    side_flow::{CoverUpload, SideFlowRegistry},
};

/// Handle passed to every handler and background task.
pub type SharedState = Arc<AppState>;

/// Central application state: collaborators plus the in-memory authoring state.
pub struct AppState {
    config: AppConfig,
    draft_store: RwLock<Option<Arc<dyn DraftStore>>>,
    degraded: watch::Sender<bool>,
    transport: Arc<dyn Transport>,
    roles: Arc<dyn RoleChecker>,
    pending: PendingQuestions,
    aggregator: InputAggregator,
    merger: LongTextMerger,
    cover_uploads: SideFlowRegistry<CoverUpload>,
    last_sweep: Mutex<Instant>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        roles: Arc<dyn RoleChecker>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let heuristic = ContinuationHeuristic::new(config.continuation_threshold);
        Arc::new(Self {
            merger: LongTextMerger::new(heuristic, config.merge_idle),
            cover_uploads: SideFlowRegistry::new(config.side_flow_idle),
            config,
            draft_store: RwLock::new(None),
            degraded: degraded_tx,
            transport,
            roles,
            pending: PendingQuestions::new(),
            aggregator: InputAggregator::new(),
            last_sweep: Mutex::new(Instant::now()),
        })
    }

    /// Settings loaded at start-up.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current draft store, if one is installed.
    pub async fn draft_store(&self) -> Option<Arc<dyn DraftStore>> {
        let guard = self.draft_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current draft store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_draft_store(&self) -> Result<Arc<dyn DraftStore>, ServiceError> {
        self.draft_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new draft store implementation and leave degraded mode.
    pub async fn install_draft_store(&self, store: Arc<dyn DraftStore>) {
        {
            let mut guard = self.draft_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current draft store and enter degraded mode.
    pub async fn clear_draft_store(&self) {
        {
            let mut guard = self.draft_store.write().await;
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
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Outbound chat messages.
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Who may author stories.
    pub fn roles(&self) -> &dyn RoleChecker {
        self.roles.as_ref()
    }

    /// Write-through cache of pending questions.
    pub fn pending(&self) -> &PendingQuestions {
        &self.pending
    }

    /// Wizard fragment buffers.
    pub fn aggregator(&self) -> &InputAggregator {
        &self.aggregator
    }

    /// Long-text merge accumulations.
    pub fn merger(&self) -> &LongTextMerger {
        &self.merger
    }

    /// Pending cover uploads.
    pub fn cover_uploads(&self) -> &SideFlowRegistry<CoverUpload> {
        &self.cover_uploads
    }

    /// Record a sweep starting at `now` if the previous one is older than the sweep interval.
    pub async fn claim_sweep(&self, now: Instant) -> bool {
        let mut last = self.last_sweep.lock().await;
        if now.saturating_duration_since(*last) < self.config.sweep_interval {
            return false;
        }
        *last = now;
        true
    }
}
