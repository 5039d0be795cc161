//! Message model shared by the store and the cluster protocol:
//! - `ssid` - Subscription identifiers and wildcard matching
//! - `record` - The retained message record
//! - `key` - Composite index keys and scan ranges
//! - `query` - Lookup queries and their wire encoding
//! - `frame` - Frame codec for record sets sent between nodes

pub mod frame;
pub mod key;
pub mod query;
pub mod record;
pub mod ssid;

pub use frame::{Frame, FrameError, FRAME_VERSION};
pub use key::{IndexKey, ScanRange, MIN_STORED_SEGMENTS};
pub use query::{LookupQuery, QueryCodecError, MAX_QUERY_LIMIT};
pub use record::Message;
pub use ssid::{Ssid, WILDCARD};
