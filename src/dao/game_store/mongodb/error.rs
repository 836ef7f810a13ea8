use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write document `{id}` in `{collection}`")]
    Write {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to read from `{collection}`")]
    Read {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("document `{id}` already exists")]
    DuplicateId { id: String },
    #[error("document `{id}` was modified concurrently or no longer exists")]
    RevisionMismatch { id: String },
    #[error("document `{id}` is malformed: {message}")]
    Malformed { id: String, message: String },
}

/// Whether `err` reports a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}
