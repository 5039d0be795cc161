//! Cluster query plumbing:
//! - `awaiter` - Remote-query hook and response gathering
//! - `router` - Inbound request dispatch to local handlers
//! - `loopback` - In-process transport between stores

pub mod awaiter;
pub mod loopback;
pub mod router;

pub use awaiter::{Awaiter, ChannelAwaiter, ClusterError, QueryHook, ResponseSender};
pub use loopback::LoopbackTransport;
pub use router::{RequestHandler, RequestRouter};
