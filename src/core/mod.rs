//! Core infrastructure shared by the store and the cluster plumbing:
//! - `config` - Store options, defaults, and provider configuration
//! - `time` - Clock abstraction for expiry decisions

pub mod config;
pub mod time;

pub use config::*;
pub use time::*;
