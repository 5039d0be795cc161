//! Frame codec for record sets exchanged between nodes.
//!
//! Frames are MessagePack maps (`{version, messages: [{ssid, time, payload,
//! ttl?}, ...]}`) so fields are named on the wire. Decoders skip fields they
//! do not know, which lets newer nodes add fields without breaking older
//! ones; a bump of `version` is reserved for incompatible changes.

use super::key::IndexKey;
use super::record::Message;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

pub const FRAME_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("encode frame: {0}")]
    Encode(String),
    #[error("decode frame: {0}")]
    Decode(String),
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u16),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u16,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct Envelope {
    version: u16,
    #[serde(default)]
    messages: Vec<Message>,
}

/// An ordered set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame(Vec<Message>);

impl Frame {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Message>) {
        self.0.extend(other);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let envelope = EnvelopeRef {
            version: FRAME_VERSION,
            messages: &self.0,
        };
        rmp_serde::to_vec_named(&envelope).map_err(|e| FrameError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let envelope: Envelope =
            rmp_serde::from_slice(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
        if envelope.version != FRAME_VERSION {
            return Err(FrameError::UnsupportedVersion(envelope.version));
        }
        Ok(Self(envelope.messages))
    }

    /// Order newest first; equal times fall back to descending key order.
    pub fn sort_newest_first(&mut self) {
        self.0.sort_by(compare_newest_first);
    }

    /// Drop records whose composite key was already seen, keeping the first.
    pub fn dedupe(&mut self) {
        let mut seen = HashSet::with_capacity(self.0.len());
        self.0.retain(|msg| match IndexKey::new(&msg.ssid, msg.time) {
            Some(key) => seen.insert(key),
            None => true,
        });
    }

    pub fn truncate(&mut self, limit: usize) {
        self.0.truncate(limit);
    }
}

fn compare_newest_first(a: &Message, b: &Message) -> Ordering {
    b.time
        .cmp(&a.time)
        .then_with(|| b.ssid.segments().cmp(a.ssid.segments()))
}

impl From<Vec<Message>> for Frame {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

impl IntoIterator for Frame {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
