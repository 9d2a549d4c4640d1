use std::path::PathBuf;

use thiserror::Error;

/// Type alias for `Result<T, strata_message_store::Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents all the ways a store operation can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// The stream was not at the version the writer expected.
    #[error("expected stream \"{stream_id}\" to be at version {expected_version}, got {actual_version}")]
    Concurrency {
        stream_id: String,
        expected_version: u64,
        actual_version: u64,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to serialize record: {0}")]
    SerializeRecord(#[source] serde_json::Error),
    #[error("failed to deserialize record on line {line}: {source}")]
    DeserializeRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// Another store holds the write lock on the log file.
    #[error("log file {} is locked by another writer", path.display())]
    Locked {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A failed append could not be rolled back, so the file ends in a partial record.
    #[error("log file {} ends in a partial record that could not be removed", path.display())]
    Poisoned { path: PathBuf },
    /// The store was opened read-only.
    #[error("store is read-only")]
    ReadOnly,
    /// Read write lock error.
    #[error("could not get read/write lock")]
    RwPoison,
}

impl Error {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, Error::Concurrency { .. })
    }
}
