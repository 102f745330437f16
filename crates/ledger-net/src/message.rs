//! Gossip messages
//!
//! Peers exchange exactly three messages. Queries carry no data; a ledger
//! response carries a JSON array of entries, either the sender's tip alone
//! or its whole ledger. Nothing on the wire tells the two apart except the
//! number of entries.
//!
//! A ledger response must fit in one frame. [`response_frame_len`] sizes a
//! response from per-entry encoded lengths, so callers can keep a running
//! total instead of re-encoding a whole ledger.

use crate::framing::{Frame, FrameCodec, FrameError, FrameType};
use bytes::BytesMut;
use gossip_ledger_core::{Entry, Ledger};
use tokio_util::codec::{Decoder, Encoder};

/// A message exchanged between peers.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Ask for the receiver's tip entry
    QueryLatest,
    /// Ask for the receiver's complete ledger
    QueryAll,
    /// A tip announcement or a complete ledger
    ResponseLedger(Vec<Entry>),
}

impl Message {
    /// Response carrying only the ledger's tip.
    pub fn latest(ledger: &Ledger) -> Self {
        Self::ResponseLedger(vec![ledger.tip().clone()])
    }

    /// Response carrying the whole ledger.
    pub fn all(ledger: &Ledger) -> Self {
        Self::ResponseLedger(ledger.to_vec())
    }

    /// The frame type this message travels as.
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::QueryLatest => FrameType::QueryLatest,
            Self::QueryAll => FrameType::QueryAll,
            Self::ResponseLedger(_) => FrameType::ResponseLedger,
        }
    }

    /// Encode into a frame.
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            Self::QueryLatest | Self::QueryAll => Ok(Frame::empty(self.frame_type())),
            Self::ResponseLedger(entries) => Ok(Frame::new(
                FrameType::ResponseLedger,
                serde_json::to_vec(entries)?,
            )),
        }
    }

    /// Decode from a frame. Query payloads are ignored.
    pub fn from_frame(frame: Frame) -> Result<Self, FrameError> {
        match frame.frame_type {
            FrameType::QueryLatest => Ok(Self::QueryLatest),
            FrameType::QueryAll => Ok(Self::QueryAll),
            FrameType::ResponseLedger => Ok(Self::ResponseLedger(serde_json::from_slice(
                &frame.payload,
            )?)),
        }
    }
}

/// Encoded size of `entry` as one element of a ledger response.
pub fn encoded_entry_len(entry: &Entry) -> Result<usize, FrameError> {
    Ok(serde_json::to_vec(entry)?.len())
}

/// Frame length (type byte included) of a ledger response carrying
/// `count` entries whose encoded sizes sum to `entries_len`.
pub fn response_frame_len(count: usize, entries_len: usize) -> usize {
    // Type byte, brackets, separators
    1 + 2 + entries_len + count.saturating_sub(1)
}

/// Codec turning a byte stream into [`Message`]s and back.
#[derive(Debug, Default)]
pub struct MessageCodec {
    frames: FrameCodec,
}

impl MessageCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(frame) => Message::from_frame(frame).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = item.to_frame()?;
        self.frames.encode(frame, dst)
    }
}
