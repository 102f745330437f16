//! Content hashing for ledger entries
//!
//! `hash = hex(SHA-256(index || previous_hash || timestamp || canonical_json(payload)))`
//!
//! Every component is rendered as text and concatenated without separators.
//! Timestamps use the shortest decimal form that round-trips, so whole
//! seconds carry no fractional part.

use crate::canonical::canonical_json;
use crate::error::Result;
use crate::types::{Entry, Hash, Payload};
use sha2::{Digest, Sha256};

/// Compute the content hash of an entry's fields.
///
/// Pure and deterministic. Fails only if the payload cannot be serialized.
pub fn compute_hash(
    index: u64,
    previous_hash: &str,
    timestamp: f64,
    payload: &Payload,
) -> Result<Hash> {
    let payload_json = canonical_json(payload)?;

    let mut hasher = Sha256::new();
    hasher.update(index.to_string().as_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(payload_json.as_bytes());

    Ok(hex::encode(hasher.finalize()))
}

/// Recompute the hash an entry should carry.
pub fn hash_entry(entry: &Entry) -> Result<Hash> {
    compute_hash(
        entry.index,
        &entry.previous_hash,
        entry.timestamp,
        &entry.payload,
    )
}

/// Build a correctly hashed entry from its content fields.
pub fn seal_entry(
    index: u64,
    previous_hash: Hash,
    timestamp: f64,
    payload: Payload,
) -> Result<Entry> {
    let hash = compute_hash(index, &previous_hash, timestamp, &payload)?;
    Ok(Entry {
        index,
        previous_hash,
        timestamp,
        payload,
        hash,
    })
}
