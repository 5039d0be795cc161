use super::ssid::Ssid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest limit honoured for a query, whoever sent it.
pub const MAX_QUERY_LIMIT: usize = 65_536;

/// A "last N messages" lookup, built per call and sent to peers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupQuery {
    pub ssid: Ssid,
    pub limit: u32,
}

#[derive(Debug, Error)]
pub enum QueryCodecError {
    #[error("encode lookup query: {0}")]
    Encode(String),
    #[error("decode lookup query: {0}")]
    Decode(String),
}

impl LookupQuery {
    pub fn new(ssid: impl Into<Ssid>, limit: usize) -> Self {
        Self {
            ssid: ssid.into(),
            limit: limit.min(MAX_QUERY_LIMIT) as u32,
        }
    }

    /// Effective result cap.
    pub fn limit(&self) -> usize {
        (self.limit as usize).min(MAX_QUERY_LIMIT)
    }

    /// Encode for the remote-query hook.
    pub fn encode(&self) -> Result<Vec<u8>, QueryCodecError> {
        bincode::serialize(self).map_err(|e| QueryCodecError::Encode(e.to_string()))
    }

    /// Decode a query received from a peer.
    pub fn decode(bytes: &[u8]) -> Result<Self, QueryCodecError> {
        bincode::deserialize(bytes).map_err(|e| QueryCodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ssid::WILDCARD;

    #[test]
    fn query_survives_the_wire() {
        let query = LookupQuery::new([0, 1, WILDCARD], 10);
        let decoded = LookupQuery::decode(&query.encode().unwrap()).unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            LookupQuery::decode(&[]),
            Err(QueryCodecError::Decode(_))
        ));
        assert!(LookupQuery::decode(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn limit_is_capped() {
        let query = LookupQuery::new([0, 1], usize::MAX);
        assert_eq!(query.limit(), MAX_QUERY_LIMIT);
        let forged = LookupQuery {
            ssid: Ssid::from([0, 1]),
            limit: u32::MAX,
        };
        assert_eq!(forged.limit(), MAX_QUERY_LIMIT);
    }
}
