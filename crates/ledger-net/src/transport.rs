//! TCP transport
//!
//! Every connection, whichever side dialed it, runs the same lifecycle:
//! register with the handler, feed each decoded message to it, and report
//! the disconnect when the stream ends or fails. Writes go through a bounded
//! queue drained by a dedicated task, so a slow peer never blocks the
//! caller that is sending to it.
//!
//! Only a broken stream ends a connection. A well-framed message whose
//! payload does not decode, or an outgoing message too large to frame, is
//! logged and dropped while the connection stays up.

use crate::framing::{FrameCodec, FrameError};
use crate::message::{Message, MessageCodec};
use crate::peer::{Direction, PeerId, PeerInfo};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Outbound queue full")]
    QueueFull,
}

/// Sending half of a live connection.
#[derive(Clone, Debug)]
pub struct PeerSender {
    tx: mpsc::Sender<Message>,
}

impl PeerSender {
    /// Wrap the sending side of a connection's outbound queue.
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }

    /// Queue a message without waiting.
    ///
    /// Fails if the queue is full or the connection is gone; the message is
    /// dropped in both cases.
    pub fn try_send(&self, message: Message) -> Result<(), TransportError> {
        self.tx.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Closed(_) => TransportError::ConnectionClosed,
        })
    }

    /// Check if the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receives the lifecycle events of every connection.
///
/// Callbacks are synchronous and must not block.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// A connection is up; `sender` reaches the remote side.
    fn on_connect(&self, info: PeerInfo, sender: PeerSender);

    /// A message arrived from `peer`.
    fn on_message(&self, peer: PeerId, message: Message);

    /// The connection to `peer` closed or failed.
    fn on_disconnect(&self, peer: PeerId);
}

/// Strip an optional `ws://` or `tcp://` scheme and trailing slash.
pub fn normalize_address(address: &str) -> &str {
    let address = address.trim();
    let address = address
        .strip_prefix("ws://")
        .or_else(|| address.strip_prefix("tcp://"))
        .unwrap_or(address);
    address.trim_end_matches('/')
}

/// Dial a peer at `host:port`.
pub async fn connect(address: &str) -> Result<TcpStream, TransportError> {
    let stream = TcpStream::connect(normalize_address(address)).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Drive one connection until it closes.
///
/// Calls `on_connect` once the queues are in place, `on_message` for each
/// decoded message, and `on_disconnect` exactly once on the way out.
pub async fn run_connection<H: ConnectionHandler>(
    handler: Arc<H>,
    stream: TcpStream,
    direction: Direction,
    queue_depth: usize,
) -> Result<(), TransportError> {
    let info = PeerInfo::new(stream.peer_addr()?, direction);
    let peer = info.id;

    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, FrameCodec::new());
    let mut writer = FramedWrite::new(write_half, MessageCodec::new());

    let (tx, mut rx) = mpsc::channel::<Message>(queue_depth.max(1));
    let mut writer_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let kind = message.frame_type();
            match writer.send(message).await {
                Ok(()) => {}
                // Rejected before anything reached the buffer
                Err(err @ (FrameError::TooLarge(_) | FrameError::Serialization(_))) => {
                    warn!(%peer, ?kind, %err, "outgoing message not encodable, dropping");
                }
                Err(err) => {
                    debug!(%peer, %err, "write failed");
                    break;
                }
            }
        }
    });

    handler.on_connect(info, PeerSender::new(tx));

    let result = loop {
        tokio::select! {
            next = reader.next() => match next {
                Some(Ok(frame)) => {
                    let kind = frame.frame_type;
                    match Message::from_frame(frame) {
                        Ok(message) => {
                            trace!(%peer, ?kind, "message received");
                            handler.on_message(peer, message);
                        }
                        Err(err) => debug!(%peer, ?kind, %err, "undecodable message dropped"),
                    }
                }
                Some(Err(err)) => break Err(TransportError::from(err)),
                None => break Ok(()),
            },
            _ = &mut writer_task => break Err(TransportError::ConnectionClosed),
        }
    };

    handler.on_disconnect(peer);
    writer_task.abort();
    result
}
