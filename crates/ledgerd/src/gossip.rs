//! Gossip protocol handling
//!
//! Queries are answered to the asking peer only. Ledger responses go through
//! reconciliation; any change to the local ledger is announced to every peer
//! as a single-entry response carrying the new tip.

use crate::node::{Node, Shared};
use gossip_ledger_core::{reconcile, Action, Entry, NoOpReason};
use gossip_ledger_net::{
    ConnectionHandler, Message, PeerId, PeerInfo, PeerSender, MAX_FRAME_SIZE,
};
use tracing::{debug, info, warn};

impl ConnectionHandler for Node {
    fn on_connect(&self, info: PeerInfo, sender: PeerSender) {
        info!(peer = %info.id, addr = %info.addr, direction = ?info.direction, "peer connected");

        let mut shared = self.shared.lock();
        if let Err(err) = sender.try_send(Message::QueryLatest) {
            debug!(peer = %info.id, %err, "initial query not queued");
        }
        shared.peers.add(info, sender);
    }

    fn on_message(&self, peer: PeerId, message: Message) {
        match message {
            Message::QueryLatest => {
                let shared = self.shared.lock();
                reply(&shared, peer, Message::latest(&shared.ledger));
            }
            Message::QueryAll => {
                let shared = self.shared.lock();
                let size = shared.full_response_len();
                if size > MAX_FRAME_SIZE {
                    warn!(peer = %peer, size, "ledger too large for one frame, not sending");
                    return;
                }
                reply(&shared, peer, Message::all(&shared.ledger));
            }
            Message::ResponseLedger(entries) => self.handle_ledger_response(peer, &entries),
        }
    }

    fn on_disconnect(&self, peer: PeerId) {
        if let Some(info) = self.shared.lock().peers.remove(peer) {
            info!(peer = %peer, addr = %info.addr, "peer disconnected");
        }
    }
}

impl Node {
    fn handle_ledger_response(&self, peer: PeerId, entries: &[Entry]) {
        let mut shared = self.shared.lock();
        let action = reconcile(&shared.ledger, entries);

        match action {
            Action::NoOp(NoOpReason::Invalid(err)) => {
                warn!(peer = %peer, %err, "rejected ledger data from peer");
            }
            Action::NoOp(reason) => {
                debug!(peer = %peer, ?reason, "ledger response ignored");
            }
            Action::NeedFullLedger => {
                debug!(peer = %peer, "tip does not link onto ours, querying full ledger");
                reply(&shared, peer, Message::QueryAll);
            }
            Action::Extended(entry) => {
                if let Err(err) = shared.push(entry) {
                    warn!(peer = %peer, %err, "reconciled entry failed to append");
                    return;
                }
                let tip = shared.ledger.tip().clone();
                info!(peer = %peer, index = tip.index, hash = tip.short_hash(), "appended entry from peer");

                shared.peers.broadcast(&Message::latest(&shared.ledger));
                drop(shared);
                self.notify(&tip);
            }
            Action::Replaced(ledger) => {
                let common = common_prefix_len(shared.ledger.entries(), ledger.entries());
                info!(
                    peer = %peer,
                    from_len = shared.ledger.len(),
                    to_len = ledger.len(),
                    kept = common,
                    "replaced ledger with longer chain"
                );
                shared.replace(ledger);

                shared.peers.broadcast(&Message::latest(&shared.ledger));
                let adopted = shared.ledger.entries()[common..].to_vec();
                drop(shared);
                for entry in &adopted {
                    self.notify(entry);
                }
            }
        }
    }
}

fn reply(shared: &Shared, peer: PeerId, message: Message) {
    if let Err(err) = shared.peers.send_to(peer, message) {
        debug!(peer = %peer, %err, "reply dropped");
    }
}

/// Number of leading entries two ledgers share
fn common_prefix_len(a: &[Entry], b: &[Entry]) -> usize {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x.hash == y.hash)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossip_ledger_core::{Ledger, Payload};
    use gossip_ledger_net::Direction;
    use tokio::sync::mpsc;

    struct FakePeer {
        id: PeerId,
        rx: mpsc::Receiver<Message>,
    }

    impl FakePeer {
        fn drain(&mut self) -> Vec<Message> {
            let mut messages = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                messages.push(message);
            }
            messages
        }
    }

    fn attach(node: &Node) -> FakePeer {
        let (tx, rx) = mpsc::channel(64);
        let info = PeerInfo::new("127.0.0.1:6001".parse().unwrap(), Direction::Inbound);
        let id = info.id;
        node.on_connect(info, PeerSender::new(tx));
        let mut peer = FakePeer { id, rx };
        assert_eq!(peer.drain(), vec![Message::QueryLatest]);
        peer
    }

    fn remote_ledger(payloads: &[&str]) -> Ledger {
        payloads.iter().fold(Ledger::new(), |ledger, payload| {
            let entry = ledger
                .next_entry(1_465_160_000.0 + ledger.len() as f64, Payload::from(*payload))
                .unwrap();
            ledger.append(entry).unwrap()
        })
    }

    #[test]
    fn test_connect_registers_and_queries() {
        let node = Node::new(8);
        let peer = attach(&node);
        assert_eq!(node.stats().peer_count, 1);

        node.on_disconnect(peer.id);
        assert!(node.list_peers().is_empty());
    }

    #[test]
    fn test_queries_answered_to_requester_only() {
        let node = Node::new(8);
        node.append_local("A").unwrap();
        let mut asker = attach(&node);
        let mut bystander = attach(&node);

        node.on_message(asker.id, Message::QueryLatest);
        assert_eq!(asker.drain(), vec![Message::latest(&node.ledger())]);

        node.on_message(asker.id, Message::QueryAll);
        assert_eq!(asker.drain(), vec![Message::all(&node.ledger())]);

        assert!(bystander.drain().is_empty());
    }

    #[test]
    fn test_local_append_broadcasts_tip() {
        let node = Node::new(8);
        let mut a = attach(&node);
        let mut b = attach(&node);

        let entry = node.append_local("A").unwrap().unwrap();
        let expected = vec![Message::ResponseLedger(vec![entry])];
        assert_eq!(a.drain(), expected);
        assert_eq!(b.drain(), expected);
    }

    #[test]
    fn test_linked_tip_extends_and_rebroadcasts() {
        let node = Node::new(8);
        let mut sender = attach(&node);
        let mut other = attach(&node);
        let mut rx = node.subscribe();
        let remote = remote_ledger(&["A"]);

        node.on_message(sender.id, Message::latest(&remote));

        assert_eq!(node.ledger(), remote);
        assert_eq!(&rx.try_recv().unwrap(), remote.tip());
        let announce = vec![Message::latest(&remote)];
        assert_eq!(other.drain(), announce);
        assert_eq!(sender.drain(), announce);
    }

    #[test]
    fn test_unlinked_tip_queries_sender_only() {
        let node = Node::new(8);
        node.append_local("local").unwrap();
        let mut sender = attach(&node);
        let mut other = attach(&node);
        let remote = remote_ledger(&["A", "B"]);

        node.on_message(sender.id, Message::latest(&remote));

        assert_eq!(sender.drain(), vec![Message::QueryAll]);
        assert!(other.drain().is_empty());
        assert_eq!(node.ledger().len(), 2);
    }

    #[test]
    fn test_longer_chain_replaces_and_announces() {
        let node = Node::new(8);
        node.append_local("local").unwrap();
        let mut sender = attach(&node);
        let mut other = attach(&node);
        let mut rx = node.subscribe();
        let remote = remote_ledger(&["A", "B"]);

        node.on_message(sender.id, Message::all(&remote));

        assert_eq!(node.ledger(), remote);
        let announce = vec![Message::latest(&remote)];
        assert_eq!(sender.drain(), announce);
        assert_eq!(other.drain(), announce);

        // Both non-origin entries are new to this node
        assert_eq!(&rx.try_recv().unwrap(), &remote.entries()[1]);
        assert_eq!(&rx.try_recv().unwrap(), &remote.entries()[2]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_replacement_notifies_only_new_suffix() {
        let node = Node::new(8);
        let base = remote_ledger(&["A"]);
        let mut sender = attach(&node);
        node.on_message(sender.id, Message::latest(&base));
        sender.drain();

        let mut rx = node.subscribe();
        let entry_b = base.next_entry(1.0, Payload::from("B")).unwrap();
        let longer = base.append(entry_b).unwrap();
        let entry_c = longer.next_entry(2.0, Payload::from("C")).unwrap();
        let longer = longer.append(entry_c).unwrap();

        node.on_message(sender.id, Message::all(&longer));

        assert_eq!(node.ledger(), longer);
        assert_eq!(&rx.try_recv().unwrap(), &longer.entries()[2]);
        assert_eq!(&rx.try_recv().unwrap(), &longer.entries()[3]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_equal_length_competitor_ignored() {
        let node = Node::new(8);
        let local = node.append_local("A").unwrap().unwrap();
        let mut sender = attach(&node);
        let competitor = remote_ledger(&["B"]);

        node.on_message(sender.id, Message::all(&competitor));

        assert_eq!(node.ledger().tip(), &local);
        assert!(sender.drain().is_empty());
    }

    #[test]
    fn test_tampered_entry_leaves_ledger_untouched() {
        let node = Node::new(8);
        let mut sender = attach(&node);
        let mut tampered = remote_ledger(&["A"]).tip().clone();
        tampered.payload = Payload::from("forged");

        node.on_message(sender.id, Message::ResponseLedger(vec![tampered]));

        assert_eq!(node.get_ledger(), vec![Entry::origin()]);
        assert!(sender.drain().is_empty());
    }

    #[test]
    fn test_duplicate_announcement_is_idempotent() {
        let node = Node::new(8);
        let mut sender = attach(&node);
        let remote = remote_ledger(&["A"]);

        node.on_message(sender.id, Message::latest(&remote));
        sender.drain();
        node.on_message(sender.id, Message::latest(&remote));

        assert_eq!(node.ledger(), remote);
        assert!(sender.drain().is_empty());
    }

    #[test]
    fn test_empty_response_ignored() {
        let node = Node::new(8);
        let mut sender = attach(&node);

        node.on_message(sender.id, Message::ResponseLedger(Vec::new()));

        assert_eq!(node.ledger().len(), 1);
        assert!(sender.drain().is_empty());
    }

    #[test]
    fn test_common_prefix_len() {
        let a = remote_ledger(&["A", "B"]);
        let b = remote_ledger(&["A", "C", "D"]);
        assert_eq!(common_prefix_len(a.entries(), b.entries()), 2);
        assert_eq!(common_prefix_len(a.entries(), a.entries()), 3);
    }

    #[test]
    fn test_extension_keeps_full_response_size() {
        let node = Node::new(8);
        let mut sender = attach(&node);
        let remote = remote_ledger(&["A", "B"]);

        node.on_message(sender.id, Message::latest(&remote_ledger(&["A"])));
        node.on_message(sender.id, Message::latest(&remote));
        sender.drain();

        node.on_message(sender.id, Message::QueryAll);
        let messages = sender.drain();
        let [Message::ResponseLedger(entries)] = &messages[..] else {
            panic!("expected one ledger response");
        };
        assert_eq!(entries, remote.entries());

        let shared = node.shared.lock();
        let frame = Message::all(&shared.ledger).to_frame().unwrap();
        assert_eq!(shared.full_response_len(), 1 + frame.payload.len());
    }
}
