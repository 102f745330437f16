//! Entry and ledger validation
//!
//! A candidate entry legally extends its predecessor when its index is the
//! next one, it links to the predecessor's hash, and its own hash
//! recomputes. A whole ledger is valid when it starts at the origin entry
//! and every consecutive pair passes that check. Timestamps are never
//! checked against the clock or each other.

use crate::error::{Error, Result};
use crate::integrity::hash_entry;
use crate::types::Entry;

/// Check that `candidate` legally follows `predecessor`.
///
/// Returns the first failing condition.
pub fn validate_successor(candidate: &Entry, predecessor: &Entry) -> Result<()> {
    let expected = predecessor.index + 1;
    if candidate.index != expected {
        return Err(Error::InvalidIndex {
            expected,
            actual: candidate.index,
        });
    }

    if candidate.previous_hash != predecessor.hash {
        return Err(Error::PreviousHashMismatch {
            index: candidate.index,
            expected: predecessor.hash.clone(),
            actual: candidate.previous_hash.clone(),
        });
    }

    let computed = hash_entry(candidate)?;
    if computed != candidate.hash {
        return Err(Error::HashMismatch {
            index: candidate.index,
            computed,
            transmitted: candidate.hash.clone(),
        });
    }

    Ok(())
}

/// Boolean form of [`validate_successor`].
pub fn is_valid_successor(candidate: &Entry, predecessor: &Entry) -> bool {
    validate_successor(candidate, predecessor).is_ok()
}

/// Check a complete candidate ledger from its origin entry onward.
pub fn validate_ledger(entries: &[Entry]) -> Result<()> {
    let first = entries.first().ok_or(Error::EmptyLedger)?;
    if !first.is_origin() {
        return Err(Error::OriginMismatch);
    }

    for pair in entries.windows(2) {
        validate_successor(&pair[1], &pair[0])?;
    }

    Ok(())
}

/// Boolean form of [`validate_ledger`].
pub fn is_valid_ledger(entries: &[Entry]) -> bool {
    validate_ledger(entries).is_ok()
}
