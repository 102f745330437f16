//! gossip-ledger core library
//!
//! This crate provides the replicated ledger's data model and the pure
//! decision logic every node runs: content hashing, entry and chain
//! validation, and reconciliation of a local ledger against peer reports.
//!
//! # Modules
//!
//! - [`types`]: Ledger entries, payloads and the fixed origin entry
//! - [`canonical`]: Deterministic payload serialization for hashing
//! - [`integrity`]: Content hash computation
//! - [`validation`]: Successor and whole-ledger checks
//! - [`ledger`]: The validated, shareable ledger value
//! - [`reconcile`]: Longest-valid-chain resolution of peer reports
//! - [`error`]: Error types

pub mod canonical;
pub mod error;
pub mod integrity;
pub mod ledger;
pub mod reconcile;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_vectors;

pub use error::{Error, Result};
pub use integrity::{compute_hash, hash_entry, seal_entry};
pub use ledger::Ledger;
pub use reconcile::{reconcile, Action, NoOpReason};
pub use types::*;
pub use validation::{is_valid_ledger, is_valid_successor, validate_ledger, validate_successor};
