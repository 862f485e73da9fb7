//! Process-local [`DraftStore`] used when no database is configured and by the test suite.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{
    draft_store::DraftStore,
    models::{DraftEntity, OwnerId, PendingQuestionEntity, StoryEntity},
    storage::{StorageError, StorageResult},
};

/// Cheap to clone; clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryDraftStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    drafts: DashMap<OwnerId, DraftEntity>,
    pending: DashMap<OwnerId, PendingQuestionEntity>,
    stories: DashMap<uuid::Uuid, StoryEntity>,
    offline: AtomicBool,
}

impl MemoryDraftStore {
    /// Empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend went away.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Current copy of the owner's draft, without creating one.
    pub fn draft(&self, owner: OwnerId) -> Option<DraftEntity> {
        self.inner.drafts.get(&owner).map(|entry| entry.clone())
    }

    /// Current copy of the owner's pending question.
    pub fn pending(&self, owner: OwnerId) -> Option<PendingQuestionEntity> {
        self.inner.pending.get(&owner).map(|entry| entry.clone())
    }

    /// Every published story.
    pub fn stories(&self) -> Vec<StoryEntity> {
        self.inner
            .stories
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected("in-memory store is offline".into()));
        }
        Ok(())
    }

    fn run<T, F>(&self, op: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryInner) -> T,
    {
        let result = self.ensure_online().map(|()| op(&self.inner));
        Box::pin(async move { result })
    }
}

impl DraftStore for MemoryDraftStore {
    fn find_or_create_draft(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<DraftEntity>> {
        self.run(move |inner| {
            inner
                .drafts
                .entry(owner)
                .or_insert_with(|| DraftEntity::new(owner))
                .clone()
        })
    }

    fn save_draft(&self, draft: DraftEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.drafts.insert(draft.owner_id, draft);
        })
    }

    fn delete_draft(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| inner.drafts.remove(&owner).is_some())
    }

    fn find_pending(
        &self,
        owner: OwnerId,
    ) -> BoxFuture<'static, StorageResult<Option<PendingQuestionEntity>>> {
        self.run(move |inner| inner.pending.get(&owner).map(|entry| entry.clone()))
    }

    fn find_pending_older_than(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<PendingQuestionEntity>>> {
        self.run(move |inner| {
            inner
                .pending
                .iter()
                .filter(|entry| entry.asked_at < cutoff)
                .map(|entry| entry.value().clone())
                .collect()
        })
    }

    fn save_pending(&self, question: PendingQuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.pending.insert(question.owner_id, question);
        })
    }

    fn clear_pending(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| inner.pending.remove(&owner).is_some())
    }

    fn save_story(&self, story: StoryEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.stories.insert(story.id, story);
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run(|_| ())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{FieldKind, InputMode};

    #[tokio::test]
    async fn reconnect_does_not_bring_an_offline_store_back() {
        let store = MemoryDraftStore::new();
        store.set_offline(true);

        store.try_reconnect().await.unwrap();
        assert!(store.health_check().await.is_err());

        store.set_offline(false);
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn old_questions_are_found_by_asked_at() {
        let store = MemoryDraftStore::new();
        let mut old = PendingQuestionEntity::new(1, FieldKind::Title, None, InputMode::Wizard);
        old.asked_at = SystemTime::UNIX_EPOCH;
        let fresh = PendingQuestionEntity::new(2, FieldKind::Intro, None, InputMode::Wizard);
        store.save_pending(old.clone()).await.unwrap();
        store.save_pending(fresh.clone()).await.unwrap();

        let found = store
            .find_pending_older_than(fresh.asked_at)
            .await
            .unwrap();
        assert_eq!(found, vec![old]);
    }
}
