//! Subscription identifiers.
//!
//! An SSID is the hashed form of a topic: segment 0 is the contract (tenant)
//! and every following segment is the hash of one topic level. Query SSIDs may
//! carry [`WILDCARD`] at any position; stored SSIDs never do.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash of the single-level wildcard token. Assumed never to collide with a
/// real topic hash.
pub const WILDCARD: u32 = 1_815_237_614;

/// Position of the contract segment.
pub const CONTRACT: usize = 0;

/// Ordered segments identifying a contract and a topic path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ssid(Vec<u32>);

impl Ssid {
    pub fn new(segments: impl Into<Vec<u32>>) -> Self {
        Self(segments.into())
    }

    pub fn contract(&self) -> Option<u32> {
        self.0.get(CONTRACT).copied()
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.0.contains(&WILDCARD)
    }

    /// Check whether this stored SSID is matched by `pattern`.
    ///
    /// Every pattern segment must equal the segment at the same position,
    /// except [`WILDCARD`], which accepts any single value. Segments past the
    /// end of the pattern are unconstrained, so a short pattern matches by
    /// prefix. A pattern longer than this SSID never matches.
    pub fn matches(&self, pattern: &Ssid) -> bool {
        if pattern.0.len() > self.0.len() {
            return false;
        }
        pattern
            .0
            .iter()
            .zip(&self.0)
            .all(|(want, have)| *want == WILDCARD || want == have)
    }
}

impl From<Vec<u32>> for Ssid {
    fn from(segments: Vec<u32>) -> Self {
        Self(segments)
    }
}

impl From<&[u32]> for Ssid {
    fn from(segments: &[u32]) -> Self {
        Self(segments.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for Ssid {
    fn from(segments: [u32; N]) -> Self {
        Self(segments.to_vec())
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            if *segment == WILDCARD {
                f.write_str("+")?;
            } else {
                write!(f, "{segment:08x}")?;
            }
        }
        Ok(())
    }
}
