//! Per-owner buffer of raw message fragments collected for one draft field.
//!
//! Purely in-memory: nothing here awaits, touches storage, or talks to the transport.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::dao::models::{ChatId, FieldKind, MessageId, OwnerId};

/// Field a buffer was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Opened by [`InputAggregator::start`] for a known field.
    Field(FieldKind),
    /// Created implicitly by a push without a prior start.
    Unknown,
}

/// Fragments accumulated since the last `start` for one owner.
#[derive(Debug, Clone)]
pub struct AggregationBuffer {
    /// Admin typing the value.
    pub owner: OwnerId,
    /// Chat the fragments arrive on.
    pub chat: ChatId,
    /// Raw fragment texts in arrival order.
    pub fragments: Vec<String>,
    /// Message ids of the fragments, for deletion after a successful commit.
    pub fragment_message_ids: Vec<MessageId>,
    /// Field the buffer was opened for.
    pub kind: BufferKind,
    /// When the buffer was opened.
    pub created_at: Instant,
    /// Last start or push; idle eviction counts from here.
    pub last_touched_at: Instant,
}

impl AggregationBuffer {
    fn new(owner: OwnerId, chat: ChatId, kind: BufferKind, now: Instant) -> Self {
        Self {
            owner,
            chat,
            fragments: Vec::new(),
            fragment_message_ids: Vec::new(),
            kind,
            created_at: now,
            last_touched_at: now,
        }
    }
}

/// Contents of a consumed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedInput {
    /// Fragments joined in arrival order, without separator.
    pub text: String,
    /// Chat the fragments arrived on.
    pub chat: ChatId,
    /// Kind the buffer had when consumed.
    pub kind: BufferKind,
    /// Ids of every fragment message.
    pub message_ids: Vec<MessageId>,
}

/// Zero or one open buffer per owner.
#[derive(Debug, Default)]
pub struct InputAggregator {
    buffers: DashMap<OwnerId, AggregationBuffer>,
    implicit_creations: AtomicU64,
}

impl InputAggregator {
    /// No open buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any buffer of `owner` with an empty one for `field`.
    pub fn start(&self, owner: OwnerId, chat: ChatId, field: FieldKind) {
        let replaced = self
            .buffers
            .insert(
                owner,
                AggregationBuffer::new(owner, chat, BufferKind::Field(field), Instant::now()),
            )
            .is_some();
        debug!(owner, chat, kind = %field, replaced, "aggregation buffer opened");
    }

    /// Append a fragment, creating an `Unknown` buffer when none was started.
    pub fn push(&self, owner: OwnerId, chat: ChatId, text: &str, message_id: Option<MessageId>) {
        let now = Instant::now();
        let mut buffer = self.buffers.entry(owner).or_insert_with(|| {
            self.implicit_creations.fetch_add(1, Ordering::Relaxed);
            warn!(
                owner,
                chat, "fragment pushed without an open buffer; collecting under unknown kind"
            );
            AggregationBuffer::new(owner, chat, BufferKind::Unknown, now)
        });

        buffer.chat = chat;
        buffer.fragments.push(text.to_owned());
        if let Some(id) = message_id {
            buffer.fragment_message_ids.push(id);
        }
        buffer.last_touched_at = now;
        debug!(
            owner,
            chat,
            fragments = buffer.fragments.len(),
            "fragment appended"
        );
    }

    /// Consume the buffer. `None` means there was nothing to finalize.
    pub fn finalize(&self, owner: OwnerId) -> Option<FinalizedInput> {
        let (_, buffer) = self.buffers.remove(&owner)?;
        Some(FinalizedInput {
            text: buffer.fragments.concat(),
            chat: buffer.chat,
            kind: buffer.kind,
            message_ids: buffer.fragment_message_ids,
        })
    }

    /// Drop the buffer without returning it. Returns whether one existed.
    pub fn reset(&self, owner: OwnerId) -> bool {
        self.buffers.remove(&owner).is_some()
    }

    /// Kind of the owner's open buffer, if any.
    pub fn kind_of(&self, owner: OwnerId) -> Option<BufferKind> {
        self.buffers.get(&owner).map(|buffer| buffer.kind)
    }

    /// Whether the owner has a buffer.
    pub fn is_open(&self, owner: OwnerId) -> bool {
        self.buffers.contains_key(&owner)
    }

    /// Remove buffers untouched for longer than `idle`, returning their owners.
    pub fn evict_idle(&self, now: Instant, idle: Duration) -> Vec<OwnerId> {
        let mut evicted = Vec::new();
        self.buffers.retain(|owner, buffer| {
            let keep = now.saturating_duration_since(buffer.last_touched_at) <= idle;
            if !keep {
                evicted.push(*owner);
            }
            keep
        });
        evicted
    }

    /// How many pushes arrived without a prior start since process start.
    pub fn implicit_creations(&self) -> u64 {
        self.implicit_creations.load(Ordering::Relaxed)
    }

    /// Number of open buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffer is open.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: OwnerId = 11;
    const CHAT: ChatId = 500;

    #[test]
    fn finalize_joins_fragments_in_arrival_order() {
        let aggregator = InputAggregator::new();
        aggregator.start(OWNER, CHAT, FieldKind::Intro);
        aggregator.push(OWNER, CHAT, "Once ", Some(1));
        aggregator.push(OWNER, CHAT, "upon ", Some(2));
        aggregator.push(OWNER, CHAT, "a time", Some(3));

        let finalized = aggregator.finalize(OWNER).expect("buffer open");
        assert_eq!(finalized.text, "Once upon a time");
        assert_eq!(finalized.kind, BufferKind::Field(FieldKind::Intro));
        assert_eq!(finalized.message_ids, vec![1, 2, 3]);
        assert_eq!(finalized.chat, CHAT);
    }

    #[test]
    fn finalize_is_consuming() {
        let aggregator = InputAggregator::new();
        assert_eq!(aggregator.finalize(OWNER), None);

        aggregator.start(OWNER, CHAT, FieldKind::Title);
        aggregator.push(OWNER, CHAT, "abc", None);
        assert!(aggregator.finalize(OWNER).is_some());
        assert_eq!(aggregator.finalize(OWNER), None);
    }

    #[test]
    fn restart_discards_previous_fragments() {
        let aggregator = InputAggregator::new();
        aggregator.start(OWNER, CHAT, FieldKind::Title);
        aggregator.push(OWNER, CHAT, "stale", Some(1));
        aggregator.start(OWNER, CHAT, FieldKind::Intro);
        aggregator.push(OWNER, CHAT, "fresh", Some(2));

        let finalized = aggregator.finalize(OWNER).unwrap();
        assert_eq!(finalized.text, "fresh");
        assert_eq!(finalized.message_ids, vec![2]);
        assert_eq!(finalized.kind, BufferKind::Field(FieldKind::Intro));
    }

    #[test]
    fn push_without_start_is_flagged_unknown() {
        let aggregator = InputAggregator::new();
        aggregator.push(OWNER, CHAT, "orphan", Some(9));

        assert_eq!(aggregator.implicit_creations(), 1);
        assert_eq!(aggregator.kind_of(OWNER), Some(BufferKind::Unknown));
        assert_eq!(aggregator.finalize(OWNER).unwrap().text, "orphan");
    }

    #[test]
    fn push_tracks_latest_chat() {
        let aggregator = InputAggregator::new();
        aggregator.start(OWNER, CHAT, FieldKind::EndingText);
        aggregator.push(OWNER, CHAT, "a", None);
        aggregator.push(OWNER, CHAT + 1, "b", None);

        let finalized = aggregator.finalize(OWNER).unwrap();
        assert_eq!(finalized.chat, CHAT + 1);
        assert!(finalized.message_ids.is_empty());
    }

    #[test]
    fn reset_and_idle_eviction() {
        let aggregator = InputAggregator::new();
        aggregator.start(OWNER, CHAT, FieldKind::Title);
        assert!(aggregator.reset(OWNER));
        assert!(!aggregator.reset(OWNER));

        aggregator.start(OWNER, CHAT, FieldKind::Title);
        aggregator.start(OWNER + 1, CHAT, FieldKind::Title);
        let later = Instant::now() + Duration::from_secs(120);
        let mut evicted = aggregator.evict_idle(later, Duration::from_secs(60));
        evicted.sort();
        assert_eq!(evicted, vec![OWNER, OWNER + 1]);
        assert!(aggregator.is_empty());
    }
}
