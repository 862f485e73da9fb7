use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::OwnerId;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB backend, one variant per operation.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Server never answered while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Draft lookup failed.
    #[error("failed to load draft of owner `{owner}`")]
    LoadDraft {
        /// Owner of the document.
        owner: OwnerId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Draft upsert failed.
    #[error("failed to save draft of owner `{owner}`")]
    SaveDraft {
        /// Owner of the document.
        owner: OwnerId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Draft removal failed.
    #[error("failed to delete draft of owner `{owner}`")]
    DeleteDraft {
        /// Owner of the document.
        owner: OwnerId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Read or write of a pending-question slot failed.
    #[error("failed to access pending question of owner `{owner}`")]
    PendingQuestion {
        /// Owner of the document.
        owner: OwnerId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing old pending questions failed.
    #[error("failed to list stale pending questions")]
    StalePendingQuestions {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Story insert failed.
    #[error("failed to save story `{id}`")]
    SaveStory {
        /// Story id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
