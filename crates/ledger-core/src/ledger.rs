//! The ledger value
//!
//! A [`Ledger`] is always non-empty, starts at the origin entry and is
//! hash-linked end to end: the only constructors are [`Ledger::new`] and
//! [`Ledger::from_entries`] (full validation), and the only growth is
//! [`Ledger::push`] (successor validation). Entries sit behind an `Arc`, so
//! handing out a snapshot is a reference-count bump; a push copies the
//! entries only while such a snapshot is still alive.

use crate::error::Result;
use crate::integrity::seal_entry;
use crate::types::{Entry, Payload};
use crate::validation::{validate_ledger, validate_successor};
use std::sync::Arc;

/// Immutable, validated sequence of ledger entries.
#[derive(Clone, Debug, PartialEq)]
pub struct Ledger {
    entries: Arc<Vec<Entry>>,
}

impl Ledger {
    /// A ledger holding only the origin entry.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(vec![Entry::origin()]),
        }
    }

    /// Adopt a complete candidate ledger after validating it.
    pub fn from_entries(entries: Vec<Entry>) -> Result<Self> {
        validate_ledger(&entries)?;
        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    /// All entries, origin first.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The last entry.
    pub fn tip(&self) -> &Entry {
        // Never empty: every constructor yields at least the origin entry
        &self.entries[self.entries.len() - 1]
    }

    /// Number of entries, origin included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the entry that would extend this ledger with `payload`.
    pub fn next_entry(&self, timestamp: f64, payload: Payload) -> Result<Entry> {
        let tip = self.tip();
        seal_entry(tip.index + 1, tip.hash.clone(), timestamp, payload)
    }

    /// Append `entry` in place, if it validly follows the tip.
    ///
    /// On error the ledger is unchanged.
    pub fn push(&mut self, entry: Entry) -> Result<()> {
        validate_successor(&entry, self.tip())?;
        Arc::make_mut(&mut self.entries).push(entry);
        Ok(())
    }

    /// Return a new ledger with `entry` appended, if it validly follows the tip.
    ///
    /// `self` is left untouched either way.
    pub fn append(&self, entry: Entry) -> Result<Self> {
        let mut next = self.clone();
        next.push(entry)?;
        Ok(next)
    }

    /// Owned copy of the entries.
    pub fn to_vec(&self) -> Vec<Entry> {
        self.entries.as_ref().clone()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
