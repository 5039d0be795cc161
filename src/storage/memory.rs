//! In-memory retained-message provider.
//!
//! Records are kept in an [`Index`] shared with the eviction controller.
//! `query_last` answers from the local index and, when a remote-query hook is
//! configured, merges in whatever peers return before the gather timeout.
//! Peers reach this store through [`RequestHandler::on_request`] under
//! [`REQUEST_NAME`].

use super::eviction::{prune_once, EvictionController, EvictionCounters, EvictionPolicy, PruneReport};
use super::index::{Index, InsertOutcome};
use super::provider::{Matches, QueryFuture, Storage, StoreError};
use crate::cluster::{QueryHook, RequestHandler};
use crate::config::{ConfigError, Options, StoreConfig};
use crate::message::{Frame, LookupQuery, Message, Ssid};
use crate::time::{Clock, SystemClock};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider name used in storage configuration.
pub const PROVIDER_NAME: &str = "inmemory";

/// Name under which this store answers cluster query requests.
pub const REQUEST_NAME: &str = "memstore";

/// Slack on top of the gather timeout before an awaiter is abandoned.
const GATHER_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct QueryCounters {
    stored: AtomicU64,
    lookups: AtomicU64,
    remote_frames: AtomicU64,
    malformed_frames: AtomicU64,
    rejected_requests: AtomicU64,
}

/// Point-in-time view of store activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Records currently held.
    pub entry_count: usize,
    /// Total bytes of retained payloads.
    pub total_bytes: u64,
    pub stored: u64,
    pub evicted: u64,
    pub expired: u64,
    pub lookups: u64,
    /// Peer frames decoded during `query_last`.
    pub remote_frames: u64,
    /// Peer frames dropped because they failed to decode.
    pub malformed_frames: u64,
    /// Inbound requests for this store that could not be decoded.
    pub rejected_requests: u64,
}

pub struct InMemory<C: Clock = SystemClock> {
    config: StoreConfig,
    index: Arc<Index>,
    clock: C,
    query: Option<Arc<dyn QueryHook>>,
    counters: QueryCounters,
    eviction_counters: Arc<EvictionCounters>,
    eviction: Mutex<Option<EvictionController>>,
    closed: AtomicBool,
}

impl InMemory<SystemClock> {
    /// Create a store with default configuration; `query` enables clustering.
    pub fn new(query: Option<Arc<dyn QueryHook>>) -> Self {
        Self::with_clock(query, SystemClock)
    }
}

impl<C: Clock> InMemory<C> {
    pub fn with_clock(query: Option<Arc<dyn QueryHook>>, clock: C) -> Self {
        Self {
            config: StoreConfig::default(),
            index: Arc::new(Index::new()),
            clock,
            query,
            counters: QueryCounters::default(),
            eviction_counters: Arc::default(),
            eviction: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Parse `options` and apply them. Unset keys keep their defaults.
    pub fn configure(&mut self, options: Option<&Options>) -> Result<(), ConfigError> {
        let config = StoreConfig::from_options(options)?;
        self.apply_config(config);
        Ok(())
    }

    /// Apply a resolved config and (re)start the eviction controller.
    pub fn apply_config(&mut self, config: StoreConfig) {
        if let Some(previous) = self.eviction.get_mut().take() {
            previous.stop();
        }
        tracing::info!(
            max_size = config.max_size,
            prune_ms = config.prune.as_millis() as u64,
            gather_timeout_ms = config.gather_timeout.as_millis() as u64,
            duplicates = ?config.duplicates,
            "configuring in-memory store"
        );
        let controller = EvictionController::spawn(
            self.index.clone(),
            self.clock.clone(),
            self.eviction_policy(&config),
            self.eviction_counters.clone(),
        );
        *self.eviction.get_mut() = controller;
        self.config = config;
    }

    pub fn set_query_hook(&mut self, query: Option<Arc<dyn QueryHook>>) {
        self.query = query;
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn eviction_policy(&self, config: &StoreConfig) -> EvictionPolicy {
        EvictionPolicy {
            max_size: config.max_size,
            interval: config.prune,
            batch: config.eviction_batch,
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Index a message. The SSID must carry a contract and a topic segment.
    pub fn store(&self, message: Message) -> Result<(), StoreError> {
        self.ensure_open()?;
        let expires_at = match message.ttl {
            0 => None,
            ttl => Some(self.clock.now() + Duration::from_secs(u64::from(ttl))),
        };
        match self.index.insert(message, expires_at, self.config.duplicates)? {
            InsertOutcome::Replaced { time } => {
                tracing::debug!(time, "retained record overwritten");
            }
            InsertOutcome::Inserted { .. } => {}
        }
        self.counters.stored.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Local newest-first matches; empty once the store is closed.
    pub fn lookup(&self, query: &LookupQuery) -> Frame {
        if self.is_closed() {
            return Frame::new();
        }
        self.counters.lookups.fetch_add(1, Ordering::Relaxed);
        self.index.lookup(query, self.clock.now())
    }

    /// Up to `limit` newest records matching `ssid` here and on peers.
    ///
    /// Peers that miss the gather timeout or send undecodable frames
    /// contribute nothing; the local result is always included.
    pub async fn query_last(
        &self,
        ssid: impl Into<Ssid>,
        limit: usize,
    ) -> Result<Matches, StoreError> {
        self.ensure_open()?;
        let query = LookupQuery::new(ssid, limit);
        let mut matches = self.lookup(&query);
        let local = matches.len();

        if let Some(hook) = &self.query {
            let request = query.encode()?;
            match hook.query(REQUEST_NAME, &request) {
                Ok(mut awaiter) => {
                    let timeout = self.config.gather_timeout;
                    let frames = match tokio::time::timeout(
                        timeout.saturating_add(GATHER_GRACE),
                        awaiter.gather(timeout),
                    )
                    .await
                    {
                        Ok(frames) => frames,
                        Err(_) => {
                            tracing::warn!(
                                timeout_ms = timeout.as_millis() as u64,
                                "remote gather overran its timeout; using local matches"
                            );
                            Vec::new()
                        }
                    };
                    for raw in frames {
                        match Frame::decode(&raw) {
                            Ok(frame) => {
                                self.counters.remote_frames.fetch_add(1, Ordering::Relaxed);
                                matches.extend(frame);
                            }
                            Err(err) => {
                                self.counters
                                    .malformed_frames
                                    .fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(error = %err, len = raw.len(), "dropping malformed peer frame");
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "remote query unavailable; answering locally");
                }
            }
        }

        matches.dedupe();
        matches.sort_newest_first();
        matches.truncate(query.limit());
        tracing::debug!(
            ssid = %query.ssid,
            limit = query.limit(),
            local,
            returned = matches.len(),
            "query last"
        );
        Ok(Matches::from(matches))
    }

    /// Run one eviction pass now, regardless of the background interval.
    pub fn prune(&self) -> PruneReport {
        let policy = self.eviction_policy(&self.config);
        prune_once(&self.index, &self.clock, &policy, &self.eviction_counters)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn metrics(&self) -> StoreMetrics {
        StoreMetrics {
            entry_count: self.index.len(),
            total_bytes: self.index.total_bytes(),
            stored: self.counters.stored.load(Ordering::Relaxed),
            evicted: self.eviction_counters.evicted.load(Ordering::Relaxed),
            expired: self.eviction_counters.expired.load(Ordering::Relaxed),
            lookups: self.counters.lookups.load(Ordering::Relaxed),
            remote_frames: self.counters.remote_frames.load(Ordering::Relaxed),
            malformed_frames: self.counters.malformed_frames.load(Ordering::Relaxed),
            rejected_requests: self.counters.rejected_requests.load(Ordering::Relaxed),
        }
    }

    /// Stop the eviction controller and drop all records. Repeat calls are
    /// no-ops; afterwards `store` and `query_last` fail with `Closed`.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(controller) = self.eviction.lock().take() {
            controller.stop();
        }
        self.index.close();
        tracing::info!("in-memory store closed");
        Ok(())
    }
}

impl<C: Clock> RequestHandler for InMemory<C> {
    fn on_request(&self, name: &str, payload: &[u8]) -> Option<Vec<u8>> {
        if name != REQUEST_NAME || self.is_closed() {
            return None;
        }
        let query = match LookupQuery::decode(payload) {
            Ok(query) => query,
            Err(err) => {
                self.counters
                    .rejected_requests
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, len = payload.len(), "rejecting malformed query request");
                return None;
            }
        };
        match self.lookup(&query).encode() {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode query response");
                None
            }
        }
    }
}

impl<C: Clock> Storage for InMemory<C> {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn configure(&mut self, options: Option<&Options>) -> Result<(), ConfigError> {
        InMemory::configure(self, options)
    }

    fn store(&self, message: Message) -> Result<(), StoreError> {
        InMemory::store(self, message)
    }

    fn query_last(&self, ssid: Ssid, limit: usize) -> QueryFuture<'_> {
        Box::pin(InMemory::query_last(self, ssid, limit))
    }

    fn close(&self) -> Result<(), StoreError> {
        InMemory::close(self)
    }
}

impl<C: Clock> Drop for InMemory<C> {
    fn drop(&mut self) {
        if let Some(controller) = self.eviction.get_mut().take() {
            controller.stop();
        }
    }
}
