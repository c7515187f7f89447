//! # Duplicate Suppressor
//!
//! Bounded FIFO record of recently observed identity keys, tagged by
//! source. Redundant push subscriptions deliver the same transaction hash
//! from several providers; the first observation wins and the rest are
//! collapsed here.
//!
//! Eviction is strict FIFO by insertion order: a frequently re-observed
//! key is evicted exactly as fast as a cold one. With a capacity large
//! relative to the arrival-time skew between sources that never matters;
//! with a tiny buffer an evicted key is treated as new again.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use ethers::types::TxHash;

/// Default bound on remembered keys.
pub const DEDUP_CAPACITY: usize = 500;

/// One first-seen identity key.
#[derive(Debug)]
pub struct DedupRecord {
    pub key: TxHash,
    /// Source that delivered the key first.
    pub source: String,
    pub first_seen: Instant,
    /// Total observations including the first.
    pub counter: u32,
}

/// Bounded ordered sequence of [`DedupRecord`] plus per-source aggregate
/// metrics: running average lag (ms between first sighting and a later
/// duplicate) and running average rank (how many sightings a key already
/// had when the source delivered it).
///
/// Owned exclusively by the multiplexer's merge task, so no locking.
#[derive(Debug)]
pub struct DedupBuffer {
    label: String,
    capacity: usize,
    records: VecDeque<DedupRecord>,
    avg_lag_ms: HashMap<String, f64>,
    avg_rank: HashMap<String, f64>,
}

impl DedupBuffer {
    pub fn new(label: &str, capacity: usize) -> Self {
        Self {
            label: label.to_string(),
            capacity: capacity.max(1),
            records: VecDeque::with_capacity(capacity.max(1)),
            avg_lag_ms: HashMap::new(),
            avg_rank: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Checks whether `key` was already delivered by any source.
    ///
    /// A hit increments the record's counter and folds this sighting into
    /// the source's lag and rank averages, then reports "duplicate".
    /// A miss leaves the buffer untouched; the caller is expected to
    /// [`insert`](Self::insert) next.
    pub fn observe(&mut self, key: TxHash, source: &str) -> bool {
        let record = match self.records.iter_mut().find(|r| r.key == key) {
            Some(record) => record,
            None => return false,
        };

        record.counter += 1;
        let lag_ms = record.first_seen.elapsed().as_millis() as f64;
        let counter = record.counter as f64;

        self.avg_lag_ms
            .entry(source.to_string())
            .and_modify(|avg| *avg = (*avg + lag_ms) / 2.0)
            .or_insert(lag_ms);
        self.avg_rank
            .entry(source.to_string())
            .and_modify(|avg| *avg = (*avg + counter) / 2.0)
            .or_insert(counter);

        true
    }

    /// Remembers a first-seen key for `source`. Reaching capacity evicts
    /// the single oldest record, ignoring how hot it is.
    pub fn insert(&mut self, key: TxHash, source: &str) {
        self.records.push_back(DedupRecord {
            key,
            source: source.to_string(),
            first_seen: Instant::now(),
            counter: 1,
        });

        let previous = self.avg_rank.get(source).copied().unwrap_or(1.0);
        self.avg_rank.insert(source.to_string(), (previous + 1.0) / 2.0);

        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
    }

    /// Per-source summary sorted by average rank, lowest (fastest) first.
    /// Logged periodically by the multiplexer.
    pub fn report(&self) -> String {
        let mut sources: Vec<(&String, f64)> = self
            .avg_rank
            .iter()
            .map(|(name, rank)| (name, *rank))
            .collect();
        sources.sort_by(|a, b| a.1.total_cmp(&b.1));

        let body = sources
            .iter()
            .map(|(name, rank)| {
                let lag = self.avg_lag_ms.get(*name).copied().unwrap_or(0.0);
                format!("{}: {:.1} ({:.0}ms)", name, rank, lag)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("push source latency {}, {}", self.label, body)
    }
}
