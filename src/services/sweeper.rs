//! Reclaims authoring state abandoned by its owner.
//!
//! Runs opportunistically on incoming updates and from a background interval, whichever
//! comes first; [`AppState::claim_sweep`](crate::state::AppState::claim_sweep) keeps the
//! two from sweeping twice per interval.

use std::{
    collections::BTreeSet,
    time::{Duration, Instant, SystemTime},
};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::{dao::models::OwnerId, state::SharedState};

/// Counts of what one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Long-text merges dropped.
    pub merges: usize,
    /// Side flows (cover uploads) dropped.
    pub side_flows: usize,
    /// Wizard buffers dropped.
    pub buffers: usize,
    /// Pending questions cleared from the store.
    pub questions: usize,
}

impl SweepReport {
    /// Whether the sweep found nothing to evict.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Evict everything idle for longer than its threshold at `now`.
///
/// Pending questions are cleared alongside their evicted buffers, unless the owner has
/// opened a new buffer in the meantime. Stored questions older than the wizard idle
/// timeout with no open buffer are cleared too; they outlive their buffer when the
/// process restarts. Storage failures are logged and leave the question for the next sweep.
pub async fn sweep(state: &SharedState, now: Instant) -> SweepReport {
    let mut report = SweepReport {
        merges: state.merger().evict_idle(now),
        side_flows: state.cover_uploads().expire(now),
        ..SweepReport::default()
    };

    let evicted = state
        .aggregator()
        .evict_idle(now, state.config().wizard_idle);
    report.buffers = evicted.len();

    match state.draft_store().await {
        Some(store) => {
            let mut owners: BTreeSet<OwnerId> = evicted.into_iter().collect();
            if let Some(cutoff) = wall_clock(now).checked_sub(state.config().wizard_idle) {
                match store.find_pending_older_than(cutoff).await {
                    Ok(stale) => owners.extend(stale.iter().map(|question| question.owner_id)),
                    Err(err) => warn!(error = %err, "failed to list stale pending questions"),
                }
            }

            for owner in owners {
                let cleared = state
                    .pending()
                    .clear_if(store.as_ref(), owner, |_| !state.aggregator().is_open(owner))
                    .await;
                match cleared {
                    Ok(true) => report.questions += 1,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(owner, error = %err, "failed to clear abandoned question");
                    }
                }
            }
        }
        None if report.buffers > 0 => warn!(
            buffers = report.buffers,
            "storage unavailable; abandoned questions kept until next sweep"
        ),
        None => {}
    }

    let trimmed = state.pending().trim_absent();
    if !report.is_empty() {
        debug!(
            merges = report.merges,
            side_flows = report.side_flows,
            buffers = report.buffers,
            questions = report.questions,
            trimmed,
            "sweep evicted idle authoring state"
        );
    }
    report
}

/// Wall-clock time corresponding to the monotonic `now`.
fn wall_clock(now: Instant) -> SystemTime {
    let current = Instant::now();
    let wall = SystemTime::now();
    match now.checked_duration_since(current) {
        Some(ahead) => wall + ahead,
        None => wall
            .checked_sub(current - now)
            .unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

/// Sweep unless another sweep ran less than one interval ago.
pub async fn sweep_if_due(state: &SharedState, now: Instant) -> Option<SweepReport> {
    if !state.claim_sweep(now).await {
        return None;
    }
    Some(sweep(state, now).await)
}

/// Background loop sweeping on the configured interval. Never returns.
pub async fn run(state: SharedState) {
    let period = state.config().sweep_interval.max(Duration::from_secs(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_if_due(&state, Instant::now()).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            draft_store::MemoryDraftStore,
            models::{FieldKind, InputMode, OwnerId, PendingQuestionEntity},
        },
        services::{roles::StaticAdmins, transport::DryRunTransport},
        state::{AppState, long_text::MergeOutcome, side_flow::CoverUpload},
    };

    const OWNER: OwnerId = 3;

    async fn setup() -> (SharedState, MemoryDraftStore) {
        let store = MemoryDraftStore::new();
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(DryRunTransport::new()),
            Arc::new(StaticAdmins::new([OWNER])),
        );
        state.install_draft_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn abandoned_wizard_loses_buffer_and_question() {
        let (state, store) = setup().await;
        let question = PendingQuestionEntity::new(OWNER, FieldKind::Intro, None, InputMode::Wizard);
        state.pending().set(&store, question).await.unwrap();
        state.aggregator().start(OWNER, 30, FieldKind::Intro);
        state.aggregator().push(OWNER, 30, "half", Some(1));

        let fresh = sweep(&state, Instant::now()).await;
        assert_eq!(fresh.buffers, 0);
        assert!(store.pending(OWNER).is_some());

        let later = Instant::now() + state.config().wizard_idle + Duration::from_secs(1);
        let report = sweep(&state, later).await;

        assert_eq!(report.buffers, 1);
        assert_eq!(report.questions, 1);
        assert!(store.pending(OWNER).is_none());
        assert!(!state.aggregator().is_open(OWNER));
    }

    #[tokio::test]
    async fn question_left_over_from_previous_process_is_cleared() {
        let (state, store) = setup().await;
        let question = PendingQuestionEntity::new(OWNER, FieldKind::Intro, None, InputMode::Wizard);
        state.pending().set(&store, question).await.unwrap();

        let restarted = AppState::new(
            AppConfig::default(),
            Arc::new(DryRunTransport::new()),
            Arc::new(StaticAdmins::new([OWNER])),
        );
        restarted.install_draft_store(Arc::new(store.clone())).await;

        let fresh = sweep(&restarted, Instant::now()).await;
        assert_eq!(fresh.questions, 0);
        assert!(store.pending(OWNER).is_some());

        let later = Instant::now() + restarted.config().wizard_idle * 2;
        let report = sweep(&restarted, later).await;

        assert_eq!(report.buffers, 0);
        assert_eq!(report.questions, 1);
        assert!(store.pending(OWNER).is_none());
        assert_eq!(restarted.pending().get(&store, OWNER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn old_question_with_live_buffer_is_kept() {
        let (state, store) = setup().await;
        let mut question =
            PendingQuestionEntity::new(OWNER, FieldKind::Intro, None, InputMode::Wizard);
        question.asked_at = SystemTime::UNIX_EPOCH;
        state.pending().set(&store, question).await.unwrap();
        state.aggregator().start(OWNER, 30, FieldKind::Intro);

        let report = sweep(&state, Instant::now()).await;

        assert_eq!(report.questions, 0);
        assert!(store.pending(OWNER).is_some());
        assert!(state.aggregator().is_open(OWNER));
    }

    #[tokio::test]
    async fn stale_merge_and_cover_upload_are_dropped() {
        let (state, _store) = setup().await;
        let long = "a".repeat(state.config().continuation_threshold);
        assert_eq!(
            state.merger().feed(OWNER, 30, &long, Some(1)),
            MergeOutcome::Accumulating
        );
        state.cover_uploads().begin(OWNER, CoverUpload { chat: 30 });

        let later = Instant::now() + state.config().side_flow_idle + Duration::from_secs(1);
        let report = sweep(&state, later).await;

        assert_eq!(report.merges, 1);
        assert_eq!(report.side_flows, 1);
        assert!(!state.merger().is_accumulating(OWNER));
        assert_eq!(state.cover_uploads().find(OWNER), None);
    }

    #[tokio::test]
    async fn lazy_sweep_runs_once_per_interval() {
        let (state, _store) = setup().await;
        let start = Instant::now() + state.config().sweep_interval;

        assert!(sweep_if_due(&state, start).await.is_some());
        assert!(sweep_if_due(&state, start).await.is_none());
        assert!(
            sweep_if_due(&state, start + state.config().sweep_interval)
                .await
                .is_some()
        );
    }
}
