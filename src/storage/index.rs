//! Ordered, internally synchronised index of retained records.
//!
//! Records live in a `BTreeMap` keyed by [`IndexKey`], so a contract+topic
//! prefix is one contiguous key range ordered by time. Two side indexes keep
//! eviction cheap: `(time, key)` for oldest-first removal and
//! `(deadline, key)` for TTL expiry. All three are updated under a single
//! write lock, so readers never observe a half-written record.

use crate::config::DuplicatePolicy;
use crate::message::{Frame, IndexKey, LookupQuery, Message, ScanRange, MIN_STORED_SEGMENTS};
use crate::storage::provider::StoreError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<IndexKey, Entry>,
    by_time: BTreeSet<(u64, IndexKey)>,
    by_expiry: BTreeSet<(Instant, IndexKey)>,
    total_bytes: u64,
    closed: bool,
}

impl Inner {
    fn insert(&mut self, key: IndexKey, entry: Entry) {
        self.total_bytes = self.total_bytes.saturating_add(entry.message.size() as u64);
        self.by_time.insert((key.time(), key.clone()));
        if let Some(deadline) = entry.expires_at {
            self.by_expiry.insert((deadline, key.clone()));
        }
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &IndexKey) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.message.size() as u64);
        self.by_time.remove(&(key.time(), key.clone()));
        if let Some(deadline) = entry.expires_at {
            self.by_expiry.remove(&(deadline, key.clone()));
        }
        Some(entry)
    }
}

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { time: u64 },
    /// An existing record with the same SSID and time was overwritten.
    Replaced { time: u64 },
}

impl InsertOutcome {
    pub fn time(&self) -> u64 {
        match self {
            Self::Inserted { time } | Self::Replaced { time } => *time,
        }
    }
}

#[derive(Debug, Default)]
pub struct Index {
    inner: RwLock<Inner>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, resolving SSID+time collisions per `policy`.
    pub fn insert(
        &self,
        mut message: Message,
        expires_at: Option<Instant>,
        policy: DuplicatePolicy,
    ) -> Result<InsertOutcome, StoreError> {
        let mut key = IndexKey::new(&message.ssid, message.time).ok_or(StoreError::InvalidSsid {
            len: message.ssid.len(),
            min: MIN_STORED_SEGMENTS,
        })?;
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        let mut replaced = false;
        if inner.entries.contains_key(&key) {
            match policy {
                DuplicatePolicy::Overwrite => {
                    inner.remove(&key);
                    replaced = true;
                }
                DuplicatePolicy::Reject => {
                    return Err(StoreError::Duplicate { time: message.time });
                }
                DuplicatePolicy::Disambiguate => {
                    let mut time = message.time;
                    while inner.entries.contains_key(&key) {
                        time = time.checked_add(1).ok_or(StoreError::TimeOverflow {
                            time: message.time,
                        })?;
                        key = key.with_time(time);
                    }
                    message.time = time;
                }
            }
        }
        let time = message.time;
        inner.insert(
            key,
            Entry {
                message,
                expires_at,
            },
        );
        Ok(if replaced {
            InsertOutcome::Replaced { time }
        } else {
            InsertOutcome::Inserted { time }
        })
    }

    /// Newest-first matches for `query`, capped at its limit.
    ///
    /// Only the contract+topic range of the pattern is walked, so a pattern
    /// without a topic segment matches nothing. Records whose deadline is at
    /// or before `now` are skipped.
    pub fn lookup(&self, query: &LookupQuery, now: Instant) -> Frame {
        let limit = query.limit();
        let Some(range) = ScanRange::for_pattern(&query.ssid) else {
            return Frame::new();
        };
        if limit == 0 {
            return Frame::new();
        }
        let upper = match &range.end {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let inner = self.inner.read();
        let mut matches = Frame::with_capacity(limit.min(64));
        for entry in inner
            .entries
            .range((Bound::Included(&range.start), upper))
            .rev()
            .map(|(_, entry)| entry)
        {
            if entry.expires_at.is_some_and(|deadline| deadline <= now) {
                continue;
            }
            if entry.message.ssid.matches(&query.ssid) {
                matches.push(entry.message.clone());
                if matches.len() >= limit {
                    break;
                }
            }
        }
        matches
    }

    pub fn get(&self, key: &IndexKey) -> Option<Message> {
        self.inner
            .read()
            .entries
            .get(key)
            .map(|entry| entry.message.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.inner.read().total_bytes
    }

    /// Remove up to `batch` of the oldest records while the index holds more
    /// than `max_size`. Returns how many were removed; 0 means within bounds.
    pub fn evict_oldest_batch(&self, max_size: usize, batch: usize) -> usize {
        let mut inner = self.inner.write();
        let excess = inner.entries.len().saturating_sub(max_size).min(batch);
        let mut removed = 0;
        for _ in 0..excess {
            let Some((_, key)) = inner.by_time.pop_first() else {
                break;
            };
            if let Some(entry) = inner.entries.remove(&key) {
                inner.total_bytes = inner.total_bytes.saturating_sub(entry.message.size() as u64);
                if let Some(deadline) = entry.expires_at {
                    inner.by_expiry.remove(&(deadline, key));
                }
                removed += 1;
            }
        }
        removed
    }

    /// Remove up to `batch` records whose deadline is at or before `now`.
    pub fn purge_expired_batch(&self, now: Instant, batch: usize) -> usize {
        let mut inner = self.inner.write();
        let mut removed = 0;
        while removed < batch {
            let key = match inner.by_expiry.first() {
                Some((deadline, key)) if *deadline <= now => key.clone(),
                _ => break,
            };
            if inner.remove(&key).is_some() {
                removed += 1;
            } else {
                inner.by_expiry.pop_first();
            }
        }
        removed
    }

    /// Drop every record and refuse further inserts. The flag is set under
    /// the same write lock inserts take, so no insert can land afterwards.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        *inner = Inner {
            closed: true,
            ..Inner::default()
        };
    }
}
