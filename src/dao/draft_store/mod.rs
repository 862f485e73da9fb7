//! Document store abstraction and its backends.

/// Process-local backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{DraftEntity, OwnerId, PendingQuestionEntity, StoryEntity};
use crate::dao::storage::StorageResult;

pub use memory::MemoryDraftStore;

/// Abstraction over the document store holding drafts, pending questions and stories.
///
/// Every call is a suspension point; callers must not hold in-memory map guards across them.
pub trait DraftStore: Send + Sync {
    /// Load the owner's draft, creating and persisting an empty one when absent.
    fn find_or_create_draft(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<DraftEntity>>;
    /// Insert or replace the owner's draft.
    fn save_draft(&self, draft: DraftEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Returns whether a draft existed.
    fn delete_draft(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>>;
    /// The owner's pending question, if any.
    fn find_pending(
        &self,
        owner: OwnerId,
    ) -> BoxFuture<'static, StorageResult<Option<PendingQuestionEntity>>>;
    /// Every pending question asked strictly before `cutoff`.
    fn find_pending_older_than(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<PendingQuestionEntity>>>;
    /// Overwrite the owner's single pending-question slot.
    fn save_pending(&self, question: PendingQuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Returns whether a question was pending.
    fn clear_pending(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>>;
    /// Persist a published story.
    fn save_story(&self, story: StoryEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round trip proving the backend still answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
