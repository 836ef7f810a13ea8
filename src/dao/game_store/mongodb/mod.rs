mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoGameStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateId { id } => StorageError::conflict(id, "document already exists"),
            MongoDaoError::RevisionMismatch { id } => {
                StorageError::conflict(id, "stale revision or missing document")
            }
            MongoDaoError::Malformed { id, message } => StorageError::corrupted(id, message),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
