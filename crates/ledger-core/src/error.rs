//! Error types for gossip-ledger

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// gossip-ledger core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Payload could not be serialized for hashing
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entry index does not follow its predecessor
    #[error("invalid index: expected {expected}, got {actual}")]
    InvalidIndex { expected: u64, actual: u64 },

    /// Entry does not link to its predecessor's hash
    #[error("previous hash mismatch at index {index}: expected {expected}, got {actual}")]
    PreviousHashMismatch {
        index: u64,
        expected: String,
        actual: String,
    },

    /// Hash mismatch (computed != transmitted)
    #[error("hash mismatch at index {index}: computed {computed} != transmitted {transmitted}")]
    HashMismatch {
        index: u64,
        computed: String,
        transmitted: String,
    },

    /// First entry differs from the well-known origin entry
    #[error("first entry is not the origin entry")]
    OriginMismatch,

    /// Ledger without any entries
    #[error("ledger is empty")]
    EmptyLedger,
}
