//! Per-job data held by a worker.

use bytes::Bytes;
use dashmap::DashMap;

use common::KeyValue;

/// Key to every value shuffled to it, from this worker's own map output and
/// from every peer.
///
/// One store is allocated per job and dropped wholesale on reset. Inbound
/// deliveries merge concurrently with the worker's own shuffle; values for a
/// key are kept in arrival order, so only their multiset is independent of
/// delivery order.
#[derive(Debug, Default)]
pub struct IntermediateStore {
    groups: DashMap<Bytes, Vec<Bytes>>,
}

impl IntermediateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append each value to its key's group. Returns the number of pairs merged.
    pub fn merge(&self, pairs: impl IntoIterator<Item = KeyValue>) -> u64 {
        let mut merged = 0;
        for kv in pairs {
            self.groups.entry(kv.key).or_default().push(kv.value);
            merged += 1;
        }
        merged
    }

    pub fn key_count(&self) -> usize {
        self.groups.len()
    }

    pub fn value_count(&self) -> usize {
        self.groups.iter().map(|group| group.value().len()).sum()
    }

    /// Copy of every group, sorted by key.
    pub fn snapshot(&self) -> Vec<(Bytes, Vec<Bytes>)> {
        let mut groups = self
            .groups
            .iter()
            .map(|group| (group.key().clone(), group.value().clone()))
            .collect::<Vec<_>>();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        groups
    }
}

/// Map output grouped by destination worker index, this worker's own index
/// included.
#[derive(Debug, Default)]
pub struct OutboundBuffers {
    buckets: Vec<Vec<KeyValue>>,
}

impl OutboundBuffers {
    pub fn new(destinations: u32) -> Self {
        Self {
            buckets: (0..destinations).map(|_| Vec::new()).collect(),
        }
    }

    /// Buffer `kv` for `destination`. The caller guarantees the index is in range.
    pub fn push(&mut self, destination: u32, kv: KeyValue) {
        self.buckets[destination as usize].push(kv);
    }

    pub fn counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.len() as u64).collect()
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.len() as u64).sum()
    }

    /// Non-empty buckets with their destination index.
    pub fn into_buckets(self) -> impl Iterator<Item = (u32, Vec<KeyValue>)> {
        self.buckets
            .into_iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(index, bucket)| (index as u32, bucket))
    }
}
