//! Networking primitives for gossip-ledger
//!
//! This crate provides:
//! - Length-prefixed message framing
//! - The three gossip messages and their wire encoding
//! - Peer identity and connection metadata
//! - A per-connection driver feeding a [`ConnectionHandler`]

pub mod framing;
pub mod message;
pub mod peer;
pub mod transport;

pub use framing::{Frame, FrameCodec, FrameError, FrameType, MAX_FRAME_SIZE};
pub use message::{encoded_entry_len, response_frame_len, Message, MessageCodec};
pub use peer::{Direction, PeerId, PeerInfo};
pub use transport::{
    connect, normalize_address, run_connection, ConnectionHandler, PeerSender, TransportError,
};
