use super::ssid::Ssid;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A retained message as handed over by the publish path.
///
/// Immutable once stored; the payload is reference counted so lookups can
/// hand out copies without touching the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub ssid: Ssid,
    /// Ordinal used for ordering and eviction (publish time or a counter).
    pub time: u64,
    pub payload: Bytes,
    /// Seconds the message stays visible; 0 keeps it until evicted.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ttl: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl Message {
    pub fn new(ssid: impl Into<Ssid>, time: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            ssid: ssid.into(),
            time,
            payload: payload.into(),
            ttl: 0,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u32) -> Self {
        self.ttl = ttl_secs;
        self
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
