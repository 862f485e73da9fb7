//! Reassembles one logical message the platform split into several parts.
//!
//! Per owner the merger is either idle (no entry) or accumulating. A fragment the
//! [`ContinuationHeuristic`] flags as truncated keeps the owner accumulating and must not
//! be processed further; the first fragment that looks complete closes the merge.

use std::time::{Duration, Instant};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use crate::{
    dao::models::{ChatId, MessageId, OwnerId},
    state::continuation::ContinuationHeuristic,
};

/// One raw message that took part in a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFragment {
    /// Raw text of the message.
    pub text: String,
    /// Message id, when the platform supplied one.
    pub message_id: Option<MessageId>,
}

/// Result of a completed merge, standing in for the raw text of the last message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedInput {
    /// Chat the parts arrived on.
    pub chat: ChatId,
    /// Parts in arrival order.
    pub fragments: Vec<MergedFragment>,
}

impl MergedInput {
    /// Effective input text: every fragment joined in arrival order.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect()
    }
}

/// What [`LongTextMerger::feed`] made of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// More parts are expected; the current message must not be handled yet.
    Accumulating,
    /// The logical message is complete.
    Complete(MergedInput),
}

#[derive(Debug)]
struct MergeEntry {
    chat: ChatId,
    fragments: Vec<MergedFragment>,
    last_at: Instant,
}

/// Per-owner merge state machine.
#[derive(Debug)]
pub struct LongTextMerger {
    heuristic: ContinuationHeuristic,
    idle: Duration,
    entries: DashMap<OwnerId, MergeEntry>,
}

impl LongTextMerger {
    /// Merger deciding truncation with `heuristic` and dropping merges idle for `idle`.
    pub fn new(heuristic: ContinuationHeuristic, idle: Duration) -> Self {
        Self {
            heuristic,
            idle,
            entries: DashMap::new(),
        }
    }

    /// Feed one fragment received now.
    pub fn feed(
        &self,
        owner: OwnerId,
        chat: ChatId,
        text: &str,
        message_id: Option<MessageId>,
    ) -> MergeOutcome {
        self.feed_at(owner, chat, text, message_id, Instant::now())
    }

    /// Feed one fragment observed at `now`.
    ///
    /// An accumulation idle for longer than the merge timeout is dropped before the
    /// fragment is considered, so it starts a fresh merge.
    pub fn feed_at(
        &self,
        owner: OwnerId,
        chat: ChatId,
        text: &str,
        message_id: Option<MessageId>,
        now: Instant,
    ) -> MergeOutcome {
        let fragment = MergedFragment {
            text: text.to_owned(),
            message_id,
        };
        let expects_more = self.heuristic.expects_more(text);

        match self.entries.entry(owner) {
            Entry::Occupied(mut occupied) => {
                if now.saturating_duration_since(occupied.get().last_at) > self.idle {
                    debug!(owner, "stale merge dropped before new fragment");
                    occupied.get_mut().fragments.clear();
                }
                let entry = occupied.get_mut();
                entry.chat = chat;
                entry.fragments.push(fragment);
                entry.last_at = now;

                if expects_more {
                    return MergeOutcome::Accumulating;
                }
                let entry = occupied.remove();
                debug!(owner, parts = entry.fragments.len(), "long text merged");
                MergeOutcome::Complete(MergedInput {
                    chat: entry.chat,
                    fragments: entry.fragments,
                })
            }
            Entry::Vacant(vacant) => {
                if !expects_more {
                    return MergeOutcome::Complete(MergedInput {
                        chat,
                        fragments: vec![fragment],
                    });
                }
                vacant.insert(MergeEntry {
                    chat,
                    fragments: vec![fragment],
                    last_at: now,
                });
                MergeOutcome::Accumulating
            }
        }
    }

    /// Drop the owner's accumulation, if any.
    pub fn discard(&self, owner: OwnerId) -> bool {
        self.entries.remove(&owner).is_some()
    }

    /// Whether the owner is waiting for the rest of a split message.
    pub fn is_accumulating(&self, owner: OwnerId) -> bool {
        self.entries.contains_key(&owner)
    }

    /// Remove accumulations idle for longer than the merge timeout. Returns how many were dropped.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_at) <= self.idle);
        before - self.entries.len()
    }

    /// Merge idle timeout.
    pub fn idle(&self) -> Duration {
        self.idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: OwnerId = 3;
    const CHAT: ChatId = 30;
    const IDLE: Duration = Duration::from_secs(2);

    fn merger() -> LongTextMerger {
        LongTextMerger::new(ContinuationHeuristic::new(4090), IDLE)
    }

    #[test]
    fn short_fragment_completes_immediately() {
        let merger = merger();
        let outcome = merger.feed(OWNER, CHAT, "Once upon", Some(1));

        match outcome {
            MergeOutcome::Complete(merged) => {
                assert_eq!(merged.text(), "Once upon");
                assert_eq!(merged.fragments.len(), 1);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(!merger.is_accumulating(OWNER));
    }

    #[test]
    fn long_fragment_waits_for_its_tail() {
        let merger = merger();
        let head = "a".repeat(4095);
        let tail = "b".repeat(10);

        assert_eq!(
            merger.feed(OWNER, CHAT, &head, Some(1)),
            MergeOutcome::Accumulating
        );
        assert!(merger.is_accumulating(OWNER));

        let MergeOutcome::Complete(merged) = merger.feed(OWNER, CHAT, &tail, Some(2)) else {
            panic!("expected completion after the tail");
        };
        assert_eq!(merged.text(), format!("{head}{tail}"));
        assert_eq!(
            merged
                .fragments
                .iter()
                .map(|fragment| fragment.message_id)
                .collect::<Vec<_>>(),
            vec![Some(1), Some(2)]
        );
        assert!(!merger.is_accumulating(OWNER));
    }

    #[test]
    fn idle_accumulation_is_swept() {
        let merger = merger();
        let start = Instant::now();
        merger.feed_at(OWNER, CHAT, &"a".repeat(4090), None, start);

        assert_eq!(merger.evict_idle(start + Duration::from_secs(1)), 0);
        assert_eq!(merger.evict_idle(start + Duration::from_secs(3)), 1);
        assert!(!merger.is_accumulating(OWNER));

        let MergeOutcome::Complete(merged) =
            merger.feed_at(OWNER, CHAT, "fresh", None, start + Duration::from_secs(4))
        else {
            panic!("expected a fresh single-fragment merge");
        };
        assert_eq!(merged.text(), "fresh");
    }

    #[test]
    fn stale_accumulation_is_not_extended_without_sweep() {
        let merger = merger();
        let start = Instant::now();
        merger.feed_at(OWNER, CHAT, &"a".repeat(4090), None, start);

        let MergeOutcome::Complete(merged) =
            merger.feed_at(OWNER, CHAT, "tail", None, start + Duration::from_secs(5))
        else {
            panic!("expected completion");
        };
        assert_eq!(merged.text(), "tail");
    }

    #[test]
    fn owners_do_not_interact() {
        let merger = merger();
        merger.feed(OWNER, CHAT, &"a".repeat(4090), None);

        let MergeOutcome::Complete(other) = merger.feed(OWNER + 1, CHAT + 1, "hi", None) else {
            panic!("expected completion");
        };
        assert_eq!(other.text(), "hi");
        assert!(merger.is_accumulating(OWNER));
        assert!(merger.discard(OWNER));
    }
}
