use thiserror::Error;

use crate::backend::Channel;

/// A durable-store read or write failure.
///
/// Callers get the failure, never a sentinel value; the engine's in-memory
/// host-details cache stays on its last good value when one of these comes
/// back.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("host record database error: {0}")]
    Database(#[from] redb::Error),

    #[error("host record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("host record store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no data directory available for the host record store")]
    NoDataDir,

    #[error("host record missing immediately after its initialization write")]
    LostRecord,
}

// redb reports each transaction phase with its own error type; fold them all
// into the unified redb::Error we carry.
impl From<redb::DatabaseError> for StorageError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::TableError> for StorageError {
    fn from(e: redb::TableError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(e: redb::StorageError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(e: redb::CommitError) -> Self {
        Self::Database(e.into())
    }
}

/// Fatal engine startup failures. The engine never reaches "ready" past
/// either of these; a partial set of subscriptions would leave its
/// invalidation rules unverifiable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to subscribe to the {channel} channel")]
    Subscription {
        channel: Channel,
        #[source]
        source: anyhow::Error,
    },

    #[error("ready handshake to the backend failed")]
    Handshake(#[source] anyhow::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
