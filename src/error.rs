use std::{path::PathBuf, time::Duration};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("vector store error: {0}")]
    Store(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("directory is not indexed: {0}")]
    DirectoryNotIndexed(String),

    #[error("query failed for {directory}: {reason}")]
    CollectionQueryFailed { directory: String, reason: String },

    #[error("query for {directory} timed out after {}ms", timeout.as_millis())]
    CollectionTimedOut { directory: String, timeout: Duration },

    #[error("failed to embed query: {0}")]
    EmbeddingFailed(String),

    #[error("failed to build collection registry: {0}")]
    RegistryBuildFailed(String),
}
