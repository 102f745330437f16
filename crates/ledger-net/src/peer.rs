//! Peer identity and information

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-unique identifier of one live connection.
///
/// Two connections to the same address get distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Allocate the next unused id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Get as integer
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Which side opened the connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Accepted by our listener
    Inbound,
    /// Dialed by us
    Outbound,
}

/// Information about a connected peer
#[derive(Clone, Debug)]
pub struct PeerInfo {
    /// Connection identifier
    pub id: PeerId,
    /// Remote socket address
    pub addr: SocketAddr,
    /// Who initiated the connection
    pub direction: Direction,
    /// When the connection was established
    pub connected_at: Instant,
}

impl PeerInfo {
    /// Create new peer info with a fresh id
    pub fn new(addr: SocketAddr, direction: Direction) -> Self {
        Self {
            id: PeerId::next(),
            addr,
            direction,
            connected_at: Instant::now(),
        }
    }
}
