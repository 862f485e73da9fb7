mod config;
mod connection;
mod error;
mod models;
/// Collection access and the [`DraftStore`](crate::dao::draft_store::DraftStore) impl.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoDraftStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
