//! Provider that retains nothing.

use super::provider::{Matches, QueryFuture, Storage, StoreError};
use crate::config::{ConfigError, Options};
use crate::message::{Message, Ssid};

pub const PROVIDER_NAME: &str = "noop";

/// Accepts every store and answers every query with no matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Storage for Noop {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn configure(&mut self, _options: Option<&Options>) -> Result<(), ConfigError> {
        Ok(())
    }

    fn store(&self, _message: Message) -> Result<(), StoreError> {
        Ok(())
    }

    fn query_last(&self, _ssid: Ssid, _limit: usize) -> QueryFuture<'_> {
        Box::pin(async { Ok(Matches::empty()) })
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
