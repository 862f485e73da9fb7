use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{DateTime, doc},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoDraftDocument, MongoPendingDocument, MongoStoryDocument},
};
use crate::dao::{
    draft_store::DraftStore,
    models::{DraftEntity, OwnerId, PendingQuestionEntity, StoryEntity},
    storage::StorageResult,
};

const DRAFT_COLLECTION_NAME: &str = "drafts";
const PENDING_COLLECTION_NAME: &str = "pending_questions";
const STORY_COLLECTION_NAME: &str = "stories";

/// [`DraftStore`] backed by three MongoDB collections.
#[derive(Clone)]
pub struct MongoDraftStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoDraftStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        Ok(Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        })
    }

    async fn drafts(&self) -> Collection<MongoDraftDocument> {
        let database = self.inner.database.read().await;
        database.collection::<MongoDraftDocument>(DRAFT_COLLECTION_NAME)
    }

    async fn pending(&self) -> Collection<MongoPendingDocument> {
        let database = self.inner.database.read().await;
        database.collection::<MongoPendingDocument>(PENDING_COLLECTION_NAME)
    }

    async fn stories(&self) -> Collection<MongoStoryDocument> {
        let database = self.inner.database.read().await;
        database.collection::<MongoStoryDocument>(STORY_COLLECTION_NAME)
    }

    async fn find_or_create_draft(&self, owner: OwnerId) -> MongoResult<DraftEntity> {
        let collection = self.drafts().await;
        let existing = collection
            .find_one(doc! { "_id": owner })
            .await
            .map_err(|source| MongoDaoError::LoadDraft { owner, source })?;

        if let Some(document) = existing {
            return Ok(document.into());
        }

        let draft = DraftEntity::new(owner);
        self.save_draft(draft.clone()).await?;
        Ok(draft)
    }

    async fn save_draft(&self, draft: DraftEntity) -> MongoResult<()> {
        let owner = draft.owner_id;
        let document: MongoDraftDocument = draft.into();
        self.drafts()
            .await
            .replace_one(doc! { "_id": owner }, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDraft { owner, source })?;
        Ok(())
    }

    async fn delete_draft(&self, owner: OwnerId) -> MongoResult<bool> {
        let result = self
            .drafts()
            .await
            .delete_one(doc! { "_id": owner })
            .await
            .map_err(|source| MongoDaoError::DeleteDraft { owner, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn find_pending(&self, owner: OwnerId) -> MongoResult<Option<PendingQuestionEntity>> {
        let document = self
            .pending()
            .await
            .find_one(doc! { "_id": owner })
            .await
            .map_err(|source| MongoDaoError::PendingQuestion { owner, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_pending_older_than(
        &self,
        cutoff: SystemTime,
    ) -> MongoResult<Vec<PendingQuestionEntity>> {
        let documents: Vec<MongoPendingDocument> = self
            .pending()
            .await
            .find(doc! { "asked_at": { "$lt": DateTime::from_system_time(cutoff) } })
            .await
            .map_err(|source| MongoDaoError::StalePendingQuestions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::StalePendingQuestions { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_pending(&self, question: PendingQuestionEntity) -> MongoResult<()> {
        let owner = question.owner_id;
        let document: MongoPendingDocument = question.into();
        self.pending()
            .await
            .replace_one(doc! { "_id": owner }, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::PendingQuestion { owner, source })?;
        Ok(())
    }

    async fn clear_pending(&self, owner: OwnerId) -> MongoResult<bool> {
        let result = self
            .pending()
            .await
            .delete_one(doc! { "_id": owner })
            .await
            .map_err(|source| MongoDaoError::PendingQuestion { owner, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn save_story(&self, story: StoryEntity) -> MongoResult<()> {
        let id = story.id;
        let document: MongoStoryDocument = story.into();
        self.stories()
            .await
            .replace_one(doc! { "_id": id.to_string() }, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveStory { id, source })?;
        Ok(())
    }
}

impl DraftStore for MongoDraftStore {
    fn find_or_create_draft(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<DraftEntity>> {
        let store = self.clone();
        Box::pin(async move { store.find_or_create_draft(owner).await.map_err(Into::into) })
    }

    fn save_draft(&self, draft: DraftEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_draft(draft).await.map_err(Into::into) })
    }

    fn delete_draft(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_draft(owner).await.map_err(Into::into) })
    }

    fn find_pending(
        &self,
        owner: OwnerId,
    ) -> BoxFuture<'static, StorageResult<Option<PendingQuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_pending(owner).await.map_err(Into::into) })
    }

    fn find_pending_older_than(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<PendingQuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_pending_older_than(cutoff)
                .await
                .map_err(Into::into)
        })
    }

    fn save_pending(&self, question: PendingQuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_pending(question).await.map_err(Into::into) })
    }

    fn clear_pending(&self, owner: OwnerId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.clear_pending(owner).await.map_err(Into::into) })
    }

    fn save_story(&self, story: StoryEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_story(story).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
