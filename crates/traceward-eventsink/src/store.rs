//! Container-keyed event buckets.
//!
//! All buckets live behind one reader-writer lock. Appends and cleanup
//! take it exclusively, so a reader sees a bucket either entirely before
//! or entirely after any mutation. Reads clone the requested sequence
//! and release the lock before returning.

use std::collections::{HashMap, TryReserveError, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use traceward_common::error::{Result, TracewardError};
use traceward_common::types::{ContainerKey, ExecEvent, TcpEvent};

/// Events recorded for one container.
#[derive(Debug, Default)]
struct EventBucket {
    exec: VecDeque<ExecEvent>,
    tcp: VecDeque<TcpEvent>,
}

/// Concurrency-safe collection of per-container event buckets.
#[derive(Debug, Default)]
pub struct EventStore {
    buckets: RwLock<HashMap<ContainerKey, EventBucket>>,
    max_events_per_bucket: Option<NonZeroUsize>,
    evicted: AtomicU64,
}

impl EventStore {
    /// Creates a store that keeps every event until cleanup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose exec and TCP sequences each hold at most
    /// `max_events_per_bucket` events, evicting the oldest first. `None`
    /// keeps every event.
    #[must_use]
    pub fn with_retention(max_events_per_bucket: Option<NonZeroUsize>) -> Self {
        Self {
            max_events_per_bucket,
            ..Self::default()
        }
    }

    /// Appends an exec event to the bucket of `key`, creating the bucket
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::StoreExhausted`] if the bucket cannot grow.
    pub fn put_exec(&self, key: &ContainerKey, event: ExecEvent) -> Result<()> {
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(key.clone()).or_default();
        self.append(&mut bucket.exec, event, key)
    }

    /// Appends a TCP event to the bucket of `key`, creating the bucket
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::StoreExhausted`] if the bucket cannot grow.
    pub fn put_tcp(&self, key: &ContainerKey, event: TcpEvent) -> Result<()> {
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(key.clone()).or_default();
        self.append(&mut bucket.tcp, event, key)
    }

    fn append<T>(&self, seq: &mut VecDeque<T>, event: T, key: &ContainerKey) -> Result<()> {
        self.append_with(seq, event, key, |seq| seq.try_reserve(1))
    }

    /// Appends once `reserve` succeeded; a failed reservation leaves the
    /// sequence and the eviction counter untouched.
    fn append_with<T>(
        &self,
        seq: &mut VecDeque<T>,
        event: T,
        key: &ContainerKey,
        reserve: impl FnOnce(&mut VecDeque<T>) -> std::result::Result<(), TryReserveError>,
    ) -> Result<()> {
        reserve(seq).map_err(|e| TracewardError::StoreExhausted {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if let Some(max) = self.max_events_per_bucket {
            while seq.len() >= max.get() {
                let _ = seq.pop_front();
                let _ = self.evicted.fetch_add(1, Ordering::Relaxed);
            }
        }
        seq.push_back(event);
        Ok(())
    }

    /// Returns a snapshot of the exec events of `key`, oldest first.
    ///
    /// A missing bucket yields an empty vector.
    pub fn exec_events(&self, key: &ContainerKey) -> Vec<ExecEvent> {
        self.buckets
            .read()
            .get(key)
            .map(|bucket| bucket.exec.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a snapshot of the TCP events of `key`, oldest first.
    ///
    /// A missing bucket yields an empty vector.
    pub fn tcp_events(&self, key: &ContainerKey) -> Vec<TcpEvent> {
        self.buckets
            .read()
            .get(key)
            .map(|bucket| bucket.tcp.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes the whole bucket of `key`.
    ///
    /// Returns `true` if a bucket existed.
    pub fn cleanup(&self, key: &ContainerKey) -> bool {
        let removed = self.buckets.write().remove(key).is_some();
        if removed {
            tracing::debug!(key = %key, "bucket removed");
        }
        removed
    }

    /// Returns the keys that currently hold a bucket, sorted.
    pub fn keys(&self) -> Vec<ContainerKey> {
        let mut keys: Vec<_> = self.buckets.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    /// Returns `true` if no bucket exists.
    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    /// Returns how many events the retention bound has evicted.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
