use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    AccessRank, DraftEntity, EndingEntity, FieldKind, InputMode, OwnerId, PendingQuestionEntity,
    StoryEndingEntity, StoryEntity,
};

/// Draft document keyed by its owner: one draft per admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDraftDocument {
    #[serde(rename = "_id")]
    owner_id: OwnerId,
    title: Option<String>,
    intro: Option<String>,
    #[serde(default)]
    endings: Vec<EndingEntity>,
    #[serde(default)]
    min_rank: AccessRank,
    cover_file_id: Option<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<DraftEntity> for MongoDraftDocument {
    fn from(value: DraftEntity) -> Self {
        Self {
            owner_id: value.owner_id,
            title: value.title,
            intro: value.intro,
            endings: value.endings,
            min_rank: value.min_rank,
            cover_file_id: value.cover_file_id,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoDraftDocument> for DraftEntity {
    fn from(value: MongoDraftDocument) -> Self {
        Self {
            owner_id: value.owner_id,
            title: value.title,
            intro: value.intro,
            endings: value.endings,
            min_rank: value.min_rank,
            cover_file_id: value.cover_file_id,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Pending-question slot keyed by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPendingDocument {
    #[serde(rename = "_id")]
    owner_id: OwnerId,
    field: FieldKind,
    index: Option<u32>,
    #[serde(default)]
    mode: InputMode,
    asked_at: DateTime,
}

impl From<PendingQuestionEntity> for MongoPendingDocument {
    fn from(value: PendingQuestionEntity) -> Self {
        Self {
            owner_id: value.owner_id,
            field: value.field,
            index: value.index.map(|index| index as u32),
            mode: value.mode,
            asked_at: DateTime::from_system_time(value.asked_at),
        }
    }
}

impl From<MongoPendingDocument> for PendingQuestionEntity {
    fn from(value: MongoPendingDocument) -> Self {
        Self {
            owner_id: value.owner_id,
            field: value.field,
            index: value.index.map(|index| index as usize),
            mode: value.mode,
            asked_at: value.asked_at.to_system_time(),
        }
    }
}

/// Published story, keyed by its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStoryDocument {
    #[serde(rename = "_id")]
    id: String,
    author_id: OwnerId,
    title: String,
    intro: String,
    endings: Vec<StoryEndingEntity>,
    min_rank: AccessRank,
    cover_file_id: Option<String>,
    published_at: DateTime,
}

impl From<StoryEntity> for MongoStoryDocument {
    fn from(value: StoryEntity) -> Self {
        Self {
            id: value.id.to_string(),
            author_id: value.author_id,
            title: value.title,
            intro: value.intro,
            endings: value.endings,
            min_rank: value.min_rank,
            cover_file_id: value.cover_file_id,
            published_at: DateTime::from_system_time(value.published_at),
        }
    }
}
