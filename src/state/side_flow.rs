//! Single-purpose flows (cover upload and the like) that wait for one specific message.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::dao::models::{ChatId, OwnerId};

/// Cover picture awaited from an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverUpload {
    /// Chat to re-render the form in once the picture arrives.
    pub chat: ChatId,
}

#[derive(Debug)]
struct SideFlowEntry<T> {
    payload: T,
    started_at: Instant,
}

/// At most one active flow of a given type per owner, expiring after `idle`.
#[derive(Debug)]
pub struct SideFlowRegistry<T> {
    idle: Duration,
    entries: DashMap<OwnerId, SideFlowEntry<T>>,
}

impl<T: Clone> SideFlowRegistry<T> {
    /// Empty registry whose flows expire after `idle`.
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            entries: DashMap::new(),
        }
    }

    /// Start (or restart) the owner's flow.
    pub fn begin(&self, owner: OwnerId, payload: T) {
        self.entries.insert(
            owner,
            SideFlowEntry {
                payload,
                started_at: Instant::now(),
            },
        );
    }

    /// Active flow of `owner`, ignoring expired ones.
    pub fn find(&self, owner: OwnerId) -> Option<T> {
        self.find_at(owner, Instant::now())
    }

    /// [`find`](Self::find) as seen at `now`.
    pub fn find_at(&self, owner: OwnerId, now: Instant) -> Option<T> {
        let entry = self.entries.get(&owner)?;
        (now.saturating_duration_since(entry.started_at) <= self.idle)
            .then(|| entry.payload.clone())
    }

    /// Consume the owner's flow if it is still active.
    pub fn take(&self, owner: OwnerId) -> Option<T> {
        let now = Instant::now();
        let (_, entry) = self.entries.remove(&owner)?;
        (now.saturating_duration_since(entry.started_at) <= self.idle).then_some(entry.payload)
    }

    /// Drop the owner's flow. Returns whether one existed.
    pub fn cancel(&self, owner: OwnerId) -> bool {
        self.entries.remove(&owner).is_some()
    }

    /// Drop flows older than the idle threshold. Returns how many were dropped.
    pub fn expire(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.started_at) <= self.idle);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_active_flow() {
        let registry = SideFlowRegistry::new(Duration::from_secs(60));
        registry.begin(1, CoverUpload { chat: 10 });

        assert_eq!(registry.find(1), Some(CoverUpload { chat: 10 }));
        assert_eq!(registry.take(1), Some(CoverUpload { chat: 10 }));
        assert_eq!(registry.take(1), None);
    }

    #[test]
    fn expired_flows_are_invisible_and_swept() {
        let registry = SideFlowRegistry::new(Duration::from_secs(60));
        registry.begin(1, CoverUpload { chat: 10 });
        let later = Instant::now() + Duration::from_secs(61);

        assert_eq!(registry.find_at(1, later), None);
        assert_eq!(registry.expire(later), 1);
        assert!(!registry.cancel(1));
    }
}
