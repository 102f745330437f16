//! Replicated ledger node
//!
//! A [`Node`] owns the local ledger and the peer registry behind a single
//! mutex, so every mutation observes the state the previous one left. The
//! lock is never held across an `await`; network writes only enqueue.
//!
//! The public methods are the control surface an outer layer (HTTP API,
//! timers) drives: read the ledger, append locally, dial peers, list peers,
//! and subscribe to newly adopted entries.
//!
//! Every ledger this node builds locally stays transferable: an append is
//! refused if announcing the entry, or sending the whole resulting ledger
//! to a late joiner, would not fit in one frame.

use crate::registry::PeerRegistry;
use gossip_ledger_core::{Entry, Ledger, Payload};
use gossip_ledger_net::{
    connect, encoded_entry_len, response_frame_len, run_connection, Direction, FrameError,
    Message, MAX_FRAME_SIZE,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Capacity of the entry notification channel
const NOTIFY_CAPACITY: usize = 1024;

/// Node errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] gossip_ledger_core::Error),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Entry too large to announce: {size} bytes (max {max})")]
    EntryTooLarge { size: usize, max: usize },
    #[error("Ledger full: full transfer would take {size} bytes (max {max})")]
    LedgerFull { size: usize, max: usize },
    #[error("Not inside a Tokio runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// State guarded by the node lock
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) ledger: Ledger,
    pub(crate) peers: PeerRegistry,
    /// Summed encoded size of the ledger's entries
    encoded_len: usize,
}

impl Shared {
    fn new() -> Self {
        let ledger = Ledger::new();
        Self {
            encoded_len: encoded_len_of(ledger.entries()),
            ledger,
            peers: PeerRegistry::new(),
        }
    }

    /// Frame length of a response carrying the whole ledger
    pub(crate) fn full_response_len(&self) -> usize {
        response_frame_len(self.ledger.len(), self.encoded_len)
    }

    /// Append a validated successor, keeping the size total current.
    pub(crate) fn push(&mut self, entry: Entry) -> Result<(), gossip_ledger_core::Error> {
        let entry_len = encoded_len_of(std::slice::from_ref(&entry));
        self.ledger.push(entry)?;
        self.encoded_len += entry_len;
        Ok(())
    }

    pub(crate) fn replace(&mut self, ledger: Ledger) {
        self.encoded_len = encoded_len_of(ledger.entries());
        self.ledger = ledger;
    }
}

fn encoded_len_of(entries: &[Entry]) -> usize {
    entries
        .iter()
        // Entries hold plain JSON and always encode
        .map(|entry| encoded_entry_len(entry).unwrap_or_default())
        .sum()
}

/// A ledger replica participating in gossip
pub struct Node {
    pub(crate) shared: Mutex<Shared>,
    notify_tx: broadcast::Sender<Entry>,
    outbound_queue: usize,
}

impl Node {
    /// Create a node holding only the origin entry
    pub fn new(outbound_queue: usize) -> Self {
        let (notify_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            shared: Mutex::new(Shared::new()),
            notify_tx,
            outbound_queue,
        }
    }

    /// Snapshot of the current ledger
    pub fn ledger(&self) -> Ledger {
        self.shared.lock().ledger.clone()
    }

    /// Entries of the current ledger, origin first
    pub fn get_ledger(&self) -> Vec<Entry> {
        self.ledger().to_vec()
    }

    /// Append `payload` as a new local entry and announce it to every peer.
    ///
    /// Fails if the payload cannot be serialized, if the entry would not fit
    /// in one frame, or if the whole ledger would no longer fit in one frame.
    /// Returns `Ok(None)` if the built entry does not extend the tip, which
    /// is dropped.
    pub fn append_local<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<Option<Entry>, NodeError> {
        let payload = Payload::from_serialize(payload)?;
        let timestamp = unix_timestamp();

        let mut shared = self.shared.lock();
        let entry = shared.ledger.next_entry(timestamp, payload)?;

        let entry_len = encoded_entry_len(&entry)?;
        let size = response_frame_len(1, entry_len);
        if size > MAX_FRAME_SIZE {
            return Err(NodeError::EntryTooLarge {
                size,
                max: MAX_FRAME_SIZE,
            });
        }
        let size = response_frame_len(shared.ledger.len() + 1, shared.encoded_len + entry_len);
        if size > MAX_FRAME_SIZE {
            return Err(NodeError::LedgerFull {
                size,
                max: MAX_FRAME_SIZE,
            });
        }

        if let Err(err) = shared.push(entry.clone()) {
            error!(%err, index = entry.index, "local entry rejected, dropping append");
            return Ok(None);
        }

        info!(index = entry.index, hash = entry.short_hash(), "entry appended");
        let queued = shared.peers.broadcast(&Message::latest(&shared.ledger));
        debug!(peers = queued, "tip announced");
        drop(shared);

        self.notify(&entry);
        Ok(Some(entry))
    }

    /// Dial each address in the background.
    ///
    /// Every connection that comes up is registered and asked for its tip.
    /// Dial failures are logged and not retried. Must be called from within
    /// a Tokio runtime; otherwise nothing is dialed and an error is returned.
    pub fn connect_to_peers<I, S>(self: &Arc<Self>, addresses: I) -> Result<(), NodeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let runtime = Handle::try_current()?;
        for address in addresses {
            let address = address.into();
            let node = Arc::clone(self);
            runtime.spawn(async move {
                let stream = match connect(&address).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        warn!(%address, %err, "connection failed");
                        return;
                    }
                };
                let queue = node.outbound_queue;
                if let Err(err) = run_connection(node, stream, Direction::Outbound, queue).await {
                    debug!(%address, %err, "connection closed with error");
                }
            });
        }
        Ok(())
    }

    /// Serve an accepted inbound connection until it closes
    pub async fn accept(self: Arc<Self>, stream: tokio::net::TcpStream) {
        let queue = self.outbound_queue;
        if let Err(err) = run_connection(self, stream, Direction::Inbound, queue).await {
            debug!(%err, "inbound connection closed with error");
        }
    }

    /// Remote `ip:port` of every live connection
    pub fn list_peers(&self) -> Vec<String> {
        self.shared.lock().peers.addresses()
    }

    /// Receive every entry that becomes part of the local ledger.
    ///
    /// Receivers that fall behind skip notifications rather than slowing
    /// the node down.
    pub fn subscribe(&self) -> broadcast::Receiver<Entry> {
        self.notify_tx.subscribe()
    }

    /// Get node statistics
    pub fn stats(&self) -> NodeStats {
        let shared = self.shared.lock();
        NodeStats {
            ledger_len: shared.ledger.len(),
            tip_index: shared.ledger.tip().index,
            tip_hash: shared.ledger.tip().hash.clone(),
            peer_count: shared.peers.len(),
        }
    }

    pub(crate) fn notify(&self, entry: &Entry) {
        // No subscribers is fine
        let _ = self.notify_tx.send(entry.clone());
    }
}

/// Node statistics
#[derive(Debug, Clone)]
pub struct NodeStats {
    pub ledger_len: usize,
    pub tip_index: u64,
    pub tip_hash: String,
    pub peer_count: usize,
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossip_ledger_core::{is_valid_ledger, Entry};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_new_node_holds_origin() {
        let node = Node::new(8);
        assert_eq!(node.get_ledger(), vec![Entry::origin()]);

        let stats = node.stats();
        assert_eq!(stats.ledger_len, 1);
        assert_eq!(stats.tip_index, 0);
        assert_eq!(stats.peer_count, 0);
    }

    #[test]
    fn test_append_local() {
        let node = Node::new(8);
        let entry = node.append_local("A").unwrap().unwrap();

        let ledger = node.get_ledger();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[1], entry);
        assert_eq!(entry.previous_hash, Entry::origin().hash);
        assert_eq!(entry.payload, Payload::from("A"));
        assert!(is_valid_ledger(&ledger));
    }

    #[test]
    fn test_append_structured_payload() {
        let node = Node::new(8);
        node.append_local(&json!({"type": "command", "device": "lights", "name": "on"}))
            .unwrap();
        node.append_local(&json!({"type": "reading", "device": "temperature", "value": 31.5}))
            .unwrap();

        let ledger = node.get_ledger();
        assert_eq!(ledger.len(), 3);
        assert!(is_valid_ledger(&ledger));
    }

    #[test]
    fn test_unserializable_payload_fails() {
        let node = Node::new(8);
        let mut payload = HashMap::new();
        payload.insert((1, 2), "tuple keys are not JSON");

        assert!(matches!(
            node.append_local(&payload),
            Err(NodeError::Ledger(gossip_ledger_core::Error::Serialization(_)))
        ));
        assert_eq!(node.get_ledger().len(), 1);
    }

    #[test]
    fn test_append_notifies_subscribers() {
        let node = Node::new(8);
        let mut rx = node.subscribe();

        let entry = node.append_local("A").unwrap().unwrap();
        assert_eq!(rx.try_recv().unwrap(), entry);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_appends() {
        let node = Node::new(8);
        let snapshot = node.ledger();
        node.append_local("A").unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(node.ledger().len(), 2);
    }

    #[test]
    fn test_oversized_entry_refused() {
        let node = Node::new(8);
        let payload = "x".repeat(MAX_FRAME_SIZE);

        assert!(matches!(
            node.append_local(&payload),
            Err(NodeError::EntryTooLarge { max: MAX_FRAME_SIZE, .. })
        ));
        assert_eq!(node.get_ledger(), vec![Entry::origin()]);

        // Later appends are unaffected
        assert!(node.append_local("A").unwrap().is_some());
    }

    #[test]
    fn test_append_refused_once_ledger_would_not_transfer() {
        let node = Node::new(8);
        let chunk = "x".repeat(MAX_FRAME_SIZE / 3);

        node.append_local(&chunk).unwrap().unwrap();
        node.append_local(&chunk).unwrap().unwrap();
        assert!(matches!(
            node.append_local(&chunk),
            Err(NodeError::LedgerFull { .. })
        ));

        let shared = node.shared.lock();
        assert_eq!(shared.ledger.len(), 3);
        assert!(shared.full_response_len() <= MAX_FRAME_SIZE);
        let frame = Message::all(&shared.ledger).to_frame().unwrap();
        assert_eq!(shared.full_response_len(), 1 + frame.payload.len());
    }

    #[test]
    fn test_connect_outside_runtime_errors() {
        let node = Arc::new(Node::new(8));
        assert!(matches!(
            node.connect_to_peers(["127.0.0.1:1"]),
            Err(NodeError::NoRuntime(_))
        ));
    }
}
