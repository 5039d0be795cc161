//! Retained-message storage subsystem.
//!
//! - `provider` - Storage trait, errors, and the provider registry
//! - `index` - Ordered record index with wildcard lookup
//! - `eviction` - Size and TTL eviction controller
//! - `memory` - In-memory provider with cluster-wide query-last
//! - `noop` - Provider that retains nothing

pub mod eviction;
pub mod index;
pub mod memory;
pub mod noop;
pub mod provider;

pub use eviction::{EvictionController, EvictionPolicy, PruneReport};
pub use index::{Index, InsertOutcome};
pub use memory::{InMemory, StoreMetrics, REQUEST_NAME};
pub use noop::Noop;
pub use provider::*;
