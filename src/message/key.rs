//! Composite index keys.
//!
//! Layout: `contract(4) | topic(4) | time(8) | remaining segments(4 each)`,
//! all big-endian. Byte order therefore equals `(contract, topic, time, tail)`
//! order: a contract+topic prefix bounds one topic subtree, and within that
//! subtree keys sort by time so a reverse scan yields newest first.

use super::ssid::Ssid;
use std::fmt;

const SEGMENT: usize = 4;
const TIME: usize = 8;
const TRUNK: usize = SEGMENT * 2;
const HEADER: usize = TRUNK + TIME;

/// Minimum number of segments a stored SSID must carry (contract + topic).
pub const MIN_STORED_SEGMENTS: usize = 2;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(Vec<u8>);

impl IndexKey {
    /// Build the key for a stored record; `None` if the SSID lacks a topic.
    pub fn new(ssid: &Ssid, time: u64) -> Option<Self> {
        let segments = ssid.segments();
        if segments.len() < MIN_STORED_SEGMENTS {
            return None;
        }
        let mut buf = Vec::with_capacity(HEADER + (segments.len() - 2) * SEGMENT);
        buf.extend_from_slice(&segments[0].to_be_bytes());
        buf.extend_from_slice(&segments[1].to_be_bytes());
        buf.extend_from_slice(&time.to_be_bytes());
        for segment in &segments[2..] {
            buf.extend_from_slice(&segment.to_be_bytes());
        }
        Some(Self(buf))
    }

    pub fn time(&self) -> u64 {
        let mut raw = [0u8; TIME];
        raw.copy_from_slice(&self.0[TRUNK..HEADER]);
        u64::from_be_bytes(raw)
    }

    /// Decode the SSID back out of the key.
    pub fn ssid(&self) -> Ssid {
        let mut segments = Vec::with_capacity(2 + (self.0.len() - HEADER) / SEGMENT);
        segments.push(read_segment(&self.0[0..SEGMENT]));
        segments.push(read_segment(&self.0[SEGMENT..TRUNK]));
        segments.extend(self.0[HEADER..].chunks_exact(SEGMENT).map(read_segment));
        Ssid::new(segments)
    }

    /// Same SSID, different time.
    pub fn with_time(&self, time: u64) -> Self {
        let mut buf = self.0.clone();
        buf[TRUNK..HEADER].copy_from_slice(&time.to_be_bytes());
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

fn read_segment(raw: &[u8]) -> u32 {
    let mut buf = [0u8; SEGMENT];
    buf.copy_from_slice(raw);
    u32::from_be_bytes(buf)
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() < HEADER {
            // scan bound, not a record key
            return write!(f, "IndexKey({:02x?})", self.0);
        }
        write!(f, "IndexKey({}@{})", self.ssid(), self.time())
    }
}

/// Key range scanned for a query pattern.
///
/// The first two query segments are taken literally (including a wildcard
/// value) so a scan never leaves one contract+topic subtree. A query with
/// fewer than two segments has no range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    pub start: IndexKey,
    /// Exclusive upper bound; `None` runs to the end of the key space.
    pub end: Option<IndexKey>,
}

impl ScanRange {
    pub fn for_pattern(pattern: &Ssid) -> Option<Self> {
        let segments = pattern.segments();
        if segments.len() < MIN_STORED_SEGMENTS {
            return None;
        }
        let mut prefix = Vec::with_capacity(TRUNK);
        for segment in &segments[..MIN_STORED_SEGMENTS] {
            prefix.extend_from_slice(&segment.to_be_bytes());
        }
        let end = prefix_end(&prefix).map(IndexKey);
        Some(Self {
            start: IndexKey(prefix),
            end,
        })
    }
}

/// Smallest byte string greater than every string starting with `prefix`.
fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
