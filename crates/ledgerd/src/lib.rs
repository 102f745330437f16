//! ledgerd - gossip-ledger replication daemon
//!
//! This daemon provides:
//! - The node's in-memory hash-linked ledger
//! - Tip gossip and full-ledger catch-up with peers
//! - Longest-valid-chain reconciliation of divergent ledgers
//! - A control surface for local appends and peer management

pub mod config;
pub mod gossip;
pub mod node;
pub mod registry;
pub mod server;

pub use config::Config;
pub use node::{Node, NodeError, NodeStats};
pub use registry::PeerRegistry;
pub use server::{Server, ServerError};
