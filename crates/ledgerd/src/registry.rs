//! Live peer registry

use gossip_ledger_net::{Message, PeerId, PeerInfo, PeerSender, TransportError};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A registered connection
#[derive(Debug)]
struct RegisteredPeer {
    info: PeerInfo,
    sender: PeerSender,
}

/// Set of live peer connections.
///
/// Keyed by connection id, not address: dialing a peer that is already
/// connected yields a second entry.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: BTreeMap<PeerId, RegisteredPeer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection
    pub fn add(&mut self, info: PeerInfo, sender: PeerSender) {
        self.peers.insert(info.id, RegisteredPeer { info, sender });
    }

    /// Forget a connection. Returns its info if it was registered.
    pub fn remove(&mut self, peer: PeerId) -> Option<PeerInfo> {
        self.peers.remove(&peer).map(|registered| registered.info)
    }

    /// Queue a message for one peer.
    pub fn send_to(&self, peer: PeerId, message: Message) -> Result<(), TransportError> {
        let registered = self
            .peers
            .get(&peer)
            .ok_or(TransportError::ConnectionClosed)?;
        registered.sender.try_send(message)
    }

    /// Queue a message for every registered peer.
    ///
    /// Best effort: peers whose queue is full or closed miss the message.
    /// Returns how many peers it was queued for.
    pub fn broadcast(&self, message: &Message) -> usize {
        let mut queued = 0;
        for (id, registered) in &self.peers {
            match registered.sender.try_send(message.clone()) {
                Ok(()) => queued += 1,
                Err(TransportError::QueueFull) => {
                    warn!(peer = %id, addr = %registered.info.addr, "outbound queue full, dropping message")
                }
                Err(err) => debug!(peer = %id, %err, "broadcast skipped peer"),
            }
        }
        queued
    }

    /// Info of every registered peer
    pub fn infos(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.values().map(|registered| &registered.info)
    }

    /// Remote `ip:port` of every registered peer
    pub fn addresses(&self) -> Vec<String> {
        self.infos().map(|info| info.addr.to_string()).collect()
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossip_ledger_net::Direction;
    use tokio::sync::mpsc;

    fn peer(addr: &str, depth: usize) -> (PeerInfo, PeerSender, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(depth);
        let info = PeerInfo::new(addr.parse().unwrap(), Direction::Outbound);
        (info, PeerSender::new(tx), rx)
    }

    #[test]
    fn test_add_remove() {
        let mut registry = PeerRegistry::new();
        let (info, sender, _rx) = peer("127.0.0.1:6001", 4);
        let id = info.id;

        registry.add(info, sender);
        assert!(registry.contains(id));
        assert_eq!(registry.addresses(), vec!["127.0.0.1:6001".to_string()]);

        assert!(registry.remove(id).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_same_address_registered_twice() {
        let mut registry = PeerRegistry::new();
        let (first, first_tx, _first_rx) = peer("127.0.0.1:6001", 4);
        let (second, second_tx, _second_rx) = peer("127.0.0.1:6001", 4);

        registry.add(first, first_tx);
        registry.add(second, second_tx);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.addresses().len(), 2);
    }

    #[test]
    fn test_broadcast_reaches_every_peer() {
        let mut registry = PeerRegistry::new();
        let (a, a_tx, mut a_rx) = peer("127.0.0.1:6001", 4);
        let (b, b_tx, mut b_rx) = peer("127.0.0.1:6002", 4);
        registry.add(a, a_tx);
        registry.add(b, b_tx);

        assert_eq!(registry.broadcast(&Message::QueryLatest), 2);
        assert_eq!(a_rx.try_recv().unwrap(), Message::QueryLatest);
        assert_eq!(b_rx.try_recv().unwrap(), Message::QueryLatest);
    }

    #[test]
    fn test_broadcast_skips_full_and_closed_peers() {
        let mut registry = PeerRegistry::new();
        let (full, full_tx, _full_rx) = peer("127.0.0.1:6001", 1);
        let (closed, closed_tx, closed_rx) = peer("127.0.0.1:6002", 4);
        let (live, live_tx, mut live_rx) = peer("127.0.0.1:6003", 4);
        registry.add(full, full_tx);
        registry.add(closed, closed_tx);
        registry.add(live, live_tx);
        drop(closed_rx);

        assert_eq!(registry.broadcast(&Message::QueryAll), 2);
        // Queue of depth 1 is now full
        assert_eq!(registry.broadcast(&Message::QueryAll), 1);
        assert_eq!(live_rx.try_recv().unwrap(), Message::QueryAll);
        assert_eq!(live_rx.try_recv().unwrap(), Message::QueryAll);
    }

    #[test]
    fn test_send_to_unknown_peer() {
        let registry = PeerRegistry::new();
        let (info, _tx, _rx) = peer("127.0.0.1:6001", 1);
        assert!(matches!(
            registry.send_to(info.id, Message::QueryAll),
            Err(TransportError::ConnectionClosed)
        ));
    }
}
