//! Operations and observability.
//!
//! - `telemetry` - JSON logging setup and metrics rendering

pub mod telemetry;

pub use telemetry::*;
