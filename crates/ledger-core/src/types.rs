//! Ledger data model
//!
//! Entries serialize with the field names peers exchange on the wire
//! (`index`, `previousHash`, `timestamp`, `data`, `hash`).

use crate::canonical::to_canonical_value;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Hex-encoded SHA-256 content hash.
pub type Hash = String;

// =============================================================================
// ORIGIN ENTRY
// =============================================================================

/// Sentinel previous hash carried by the origin entry.
pub const ORIGIN_PREVIOUS_HASH: &str = "0";
/// Creation time of the origin entry (seconds since the Unix epoch).
pub const ORIGIN_TIMESTAMP: f64 = 1_465_154_705.0;
/// Payload of the origin entry.
pub const ORIGIN_PAYLOAD: &str = "my genesis block!!";
/// Hash of the origin entry. Fixed by convention and compared verbatim.
pub const ORIGIN_HASH: &str = "816534932c2b7154836da6afc367695e6337db8a921823784c14378abed4f7d7";

// =============================================================================
// PAYLOAD
// =============================================================================

/// Opaque application content carried by an entry.
///
/// The core never interprets a payload; it only needs a canonical
/// serialization for hashing and equality for origin comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub serde_json::Value);

impl Payload {
    /// Capture any serializable value as a payload.
    ///
    /// Fails for values JSON cannot represent (e.g. maps with non-string
    /// keys).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self(to_canonical_value(value)?))
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self(serde_json::Value::String(value.to_owned()))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self(serde_json::Value::String(value))
    }
}

// =============================================================================
// ENTRY
// =============================================================================

/// One immutable record of the ledger, hash-linked to its predecessor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Position in the ledger; the origin entry is 0
    pub index: u64,
    /// Hash of the entry at `index - 1`
    pub previous_hash: Hash,
    /// Creation time in seconds, informational only
    pub timestamp: f64,
    /// Application content
    #[serde(rename = "data")]
    pub payload: Payload,
    /// Content hash over the four fields above
    pub hash: Hash,
}

impl Entry {
    /// The fixed origin entry every valid ledger starts with.
    pub fn origin() -> Self {
        Self {
            index: 0,
            previous_hash: ORIGIN_PREVIOUS_HASH.to_owned(),
            timestamp: ORIGIN_TIMESTAMP,
            payload: Payload::from(ORIGIN_PAYLOAD),
            hash: ORIGIN_HASH.to_owned(),
        }
    }

    /// True if this entry is identical to the origin entry in every field.
    pub fn is_origin(&self) -> bool {
        *self == Self::origin()
    }

    /// Short hash prefix for log lines.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..12).unwrap_or(&self.hash)
    }
}
