//! Write-through cache of the per-owner pending-question slot.
//!
//! The document store is the source of truth; the cache only saves a round trip on
//! every chat message. Absence is cached as well, so all writes must go through here.
//!
//! Writes to one owner's slot are serialized by a per-owner async lock held across the
//! store call, so the cache always ends up holding what the last store write left behind.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::dao::{
    draft_store::DraftStore,
    models::{OwnerId, PendingQuestionEntity},
    storage::StorageResult,
};

/// Cached view of every owner's pending question.
#[derive(Debug, Default)]
pub struct PendingQuestions {
    cache: DashMap<OwnerId, Option<PendingQuestionEntity>>,
    locks: DashMap<OwnerId, Arc<Mutex<()>>>,
}

impl PendingQuestions {
    /// Empty cache; every owner is loaded from the store on first use.
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock(&self, owner: OwnerId) -> OwnedMutexGuard<()> {
        // The map guard is released before awaiting the owner lock.
        let lock = self.locks.entry(owner).or_default().clone();
        lock.lock_owned().await
    }

    /// Current question of `owner`, loading it from `store` on a cache miss.
    pub async fn get(
        &self,
        store: &dyn DraftStore,
        owner: OwnerId,
    ) -> StorageResult<Option<PendingQuestionEntity>> {
        if let Some(cached) = self.cache.get(&owner) {
            return Ok(cached.clone());
        }

        let _guard = self.lock(owner).await;
        self.load(store, owner).await
    }

    async fn load(
        &self,
        store: &dyn DraftStore,
        owner: OwnerId,
    ) -> StorageResult<Option<PendingQuestionEntity>> {
        if let Some(cached) = self.cache.get(&owner) {
            return Ok(cached.clone());
        }
        let loaded = store.find_pending(owner).await?;
        self.cache.insert(owner, loaded.clone());
        Ok(loaded)
    }

    /// Overwrite the owner's slot.
    pub async fn set(
        &self,
        store: &dyn DraftStore,
        question: PendingQuestionEntity,
    ) -> StorageResult<()> {
        let owner = question.owner_id;
        let _guard = self.lock(owner).await;
        // Cache stays empty until the store write succeeds.
        self.cache.remove(&owner);
        store.save_pending(question.clone()).await?;
        self.cache.insert(owner, Some(question));
        Ok(())
    }

    /// Empty the owner's slot. Returns whether a question was pending.
    pub async fn clear(&self, store: &dyn DraftStore, owner: OwnerId) -> StorageResult<bool> {
        let _guard = self.lock(owner).await;
        self.clear_locked(store, owner).await
    }

    async fn clear_locked(&self, store: &dyn DraftStore, owner: OwnerId) -> StorageResult<bool> {
        self.cache.remove(&owner);
        let existed = store.clear_pending(owner).await?;
        self.cache.insert(owner, None);
        Ok(existed)
    }

    /// Empty the slot only if it still holds `expected`. A question opened by a
    /// concurrent button press is left in place.
    pub async fn clear_if_current(
        &self,
        store: &dyn DraftStore,
        expected: &PendingQuestionEntity,
    ) -> StorageResult<bool> {
        self.clear_if(store, expected.owner_id, |current| current == expected)
            .await
    }

    /// Empty the owner's slot if it holds a question accepted by `abandoned`.
    ///
    /// The predicate sees the question under the owner's lock, so no write can slip in
    /// between the check and the clear.
    pub async fn clear_if(
        &self,
        store: &dyn DraftStore,
        owner: OwnerId,
        abandoned: impl FnOnce(&PendingQuestionEntity) -> bool,
    ) -> StorageResult<bool> {
        let _guard = self.lock(owner).await;
        match self.load(store, owner).await? {
            Some(current) if abandoned(&current) => self.clear_locked(store, owner).await,
            _ => Ok(false),
        }
    }

    /// Cached value only; `None` when the owner was never loaded.
    pub fn cached(&self, owner: OwnerId) -> Option<Option<PendingQuestionEntity>> {
        self.cache.get(&owner).map(|entry| entry.clone())
    }

    /// Forget cached absences and idle owner locks so neither map grows with every
    /// owner ever seen. Returns how many absences were dropped.
    pub fn trim_absent(&self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, question| question.is_some());
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::BoxFuture;

    use super::*;
    use crate::dao::{
        draft_store::MemoryDraftStore,
        models::{DraftEntity, FieldKind, InputMode, StoryEntity},
    };

    /// Applies every write at once but answers `clear_pending` only after a delay.
    #[derive(Clone)]
    struct SlowClearStore {
        inner: MemoryDraftStore,
        delay: Duration,
    }

    impl DraftStore for SlowClearStore {
        fn find_or_create_draft(
            &self,
            owner: OwnerId,
        ) -> BoxFuture<'static, StorageResult<DraftEntity>> {
            self.inner.find_or_create_draft(owner)
        }

        fn save_draft(&self, draft: DraftEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_draft(draft)
        }

        fn delete_draft(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_draft(owner)
        }

        fn find_pending(
            &self,
            owner: OwnerId,
        ) -> BoxFuture<'static, StorageResult<Option<PendingQuestionEntity>>> {
            self.inner.find_pending(owner)
        }

        fn find_pending_older_than(
            &self,
            cutoff: std::time::SystemTime,
        ) -> BoxFuture<'static, StorageResult<Vec<PendingQuestionEntity>>> {
            self.inner.find_pending_older_than(cutoff)
        }

        fn save_pending(
            &self,
            question: PendingQuestionEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_pending(question)
        }

        fn clear_pending(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>> {
            let reply = self.inner.clear_pending(owner);
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                reply.await
            })
        }

        fn save_story(&self, story: StoryEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_story(story)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn set_get_clear_round_trip_through_store() {
        let store = MemoryDraftStore::new();
        let pending = PendingQuestions::new();

        assert_eq!(pending.get(&store, 1).await.unwrap(), None);
        assert_eq!(pending.cached(1), Some(None));

        let question = PendingQuestionEntity::new(1, FieldKind::Title, None, InputMode::Wizard);
        pending.set(&store, question.clone()).await.unwrap();
        assert_eq!(pending.get(&store, 1).await.unwrap(), Some(question.clone()));
        assert_eq!(store.pending(1), Some(question));

        assert!(pending.clear(&store, 1).await.unwrap());
        assert_eq!(pending.get(&store, 1).await.unwrap(), None);
        assert_eq!(store.pending(1), None);
        assert_eq!(pending.trim_absent(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_stale_cache() {
        let store = MemoryDraftStore::new();
        let pending = PendingQuestions::new();
        pending
            .set(
                &store,
                PendingQuestionEntity::new(1, FieldKind::Title, None, InputMode::Wizard),
            )
            .await
            .unwrap();

        store.set_offline(true);
        assert!(pending.clear(&store, 1).await.is_err());
        assert_eq!(pending.cached(1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_during_slow_clear_keeps_cache_in_step_with_store() {
        let memory = MemoryDraftStore::new();
        let store = SlowClearStore {
            inner: memory.clone(),
            delay: Duration::from_millis(50),
        };
        let pending = Arc::new(PendingQuestions::new());
        pending
            .set(
                &store,
                PendingQuestionEntity::new(1, FieldKind::Title, None, InputMode::Wizard),
            )
            .await
            .unwrap();

        let clearing = {
            let pending = Arc::clone(&pending);
            let store = store.clone();
            tokio::spawn(async move { pending.clear(&store, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let reopened = PendingQuestionEntity::new(1, FieldKind::Intro, None, InputMode::Wizard);
        pending.set(&store, reopened.clone()).await.unwrap();
        assert!(clearing.await.unwrap().unwrap());

        assert_eq!(memory.pending(1), Some(reopened.clone()));
        assert_eq!(pending.cached(1), Some(Some(reopened.clone())));
        assert_eq!(pending.get(&store, 1).await.unwrap(), Some(reopened));
    }

    #[tokio::test]
    async fn clear_if_leaves_rejected_question_alone() {
        let store = MemoryDraftStore::new();
        let pending = PendingQuestions::new();
        let question = PendingQuestionEntity::new(1, FieldKind::Intro, None, InputMode::Wizard);
        pending.set(&store, question.clone()).await.unwrap();

        assert!(!pending.clear_if(&store, 1, |_| false).await.unwrap());
        assert_eq!(store.pending(1), Some(question));
        assert!(pending.clear_if(&store, 1, |_| true).await.unwrap());
        assert_eq!(store.pending(1), None);
        assert!(!pending.clear_if(&store, 2, |_| true).await.unwrap());
    }

    #[tokio::test]
    async fn trim_drops_idle_owner_locks() {
        let store = MemoryDraftStore::new();
        let pending = PendingQuestions::new();
        pending.get(&store, 1).await.unwrap();
        pending.clear(&store, 2).await.unwrap();

        assert_eq!(pending.trim_absent(), 2);
        assert!(pending.locks.is_empty());
    }
}
