//! Storage provider contract and registry.
//!
//! The broker picks a provider by name from its storage configuration, calls
//! `configure` once, then drives `store` from the publish path and
//! `query_last` from the subscribe path.

use super::memory::InMemory;
use super::noop::Noop;
use crate::cluster::QueryHook;
use crate::config::{ConfigError, Options, StorageConfig};
use crate::message::{Frame, Message, QueryCodecError, Ssid};
use anyhow::Context;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,
    #[error("ssid needs at least {min} segments, got {len}")]
    InvalidSsid { len: usize, min: usize },
    #[error("a record is already stored at time {time}")]
    Duplicate { time: u64 },
    #[error("no free time ordinal after {time}")]
    TimeOverflow { time: u64 },
    #[error(transparent)]
    Query(#[from] QueryCodecError),
}

/// Single-pass sequence of records produced by `query_last`.
#[derive(Debug)]
pub struct Matches {
    inner: std::vec::IntoIter<Message>,
}

impl Matches {
    pub fn empty() -> Self {
        Self::from(Frame::new())
    }
}

impl From<Frame> for Matches {
    fn from(frame: Frame) -> Self {
        Self {
            inner: frame.into_messages().into_iter(),
        }
    }
}

impl Iterator for Matches {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Matches {}

pub type QueryFuture<'a> = Pin<Box<dyn Future<Output = Result<Matches, StoreError>> + Send + 'a>>;

/// A retained-message storage backend.
pub trait Storage: Send + Sync {
    /// Stable lowercase provider identifier.
    fn name(&self) -> &'static str;

    /// Apply options once, before the store is shared.
    fn configure(&mut self, options: Option<&Options>) -> Result<(), ConfigError>;

    fn store(&self, message: Message) -> Result<(), StoreError>;

    /// Up to `limit` newest records matching `ssid`, across the cluster when
    /// the provider has a remote-query hook.
    fn query_last(&self, ssid: Ssid, limit: usize) -> QueryFuture<'_>;

    fn close(&self) -> Result<(), StoreError>;
}

impl std::fmt::Debug for dyn Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("name", &self.name()).finish()
    }
}

/// Construct an unconfigured provider by name.
pub fn provider(
    name: &str,
    hook: Option<Arc<dyn QueryHook>>,
) -> Result<Box<dyn Storage>, ConfigError> {
    match name.to_lowercase().as_str() {
        // "memory" is the name older configs used
        super::memory::PROVIDER_NAME | "memory" => Ok(Box::new(InMemory::new(hook))),
        super::noop::PROVIDER_NAME | "" => Ok(Box::new(Noop)),
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}

/// Construct and configure the provider named in `config`.
pub fn load(
    config: &StorageConfig,
    hook: Option<Arc<dyn QueryHook>>,
) -> Result<Box<dyn Storage>, ConfigError> {
    let mut storage = provider(&config.provider, hook)?;
    storage.configure(Some(&config.config))?;
    tracing::info!(provider = storage.name(), "storage provider configured");
    Ok(storage)
}

/// Parse a JSON storage section and load its provider.
pub fn load_from_json(
    raw: &str,
    hook: Option<Arc<dyn QueryHook>>,
) -> anyhow::Result<Box<dyn Storage>> {
    let config = StorageConfig::from_json(raw).context("invalid storage section")?;
    load(&config, hook).with_context(|| format!("failed to load provider {}", config.provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_resolve_by_name() {
        assert_eq!(provider("inmemory", None).unwrap().name(), "inmemory");
        assert_eq!(provider("InMemory", None).unwrap().name(), "inmemory");
        assert_eq!(provider("memory", None).unwrap().name(), "inmemory");
        assert_eq!(provider("noop", None).unwrap().name(), "noop");
        assert!(matches!(
            provider("ssd", None),
            Err(ConfigError::UnknownProvider(name)) if name == "ssd"
        ));
    }

    #[test]
    fn matches_is_exact_size() {
        let frame = Frame::from(vec![
            Message::new([0, 1], 1, b"a".to_vec()),
            Message::new([0, 1], 2, b"b".to_vec()),
        ]);
        let mut matches = Matches::from(frame);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches.next().unwrap().time, 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(Matches::empty().count(), 0);
    }
}
