//! Shared types for the map/shuffle/reduce engine.
//!
//! A job runs on a fixed roster of worker processes. The coordinator sends
//! each worker a slice of the input and the *name* of a [`Workload`]; the
//! workers map locally, exchange intermediate pairs directly with each other
//! during shuffle, and reduce the keys they own.

use std::fmt;
use std::fmt::Formatter;
use std::hash::Hasher;

use bytes::Bytes;

pub mod io;
pub mod roster;
pub mod rpc;
pub mod status;
pub mod utils;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// The output of an application reduce function. Same shape as [`MapOutput`]:
/// a reduce call may emit zero, one or many pairs.
pub type ReduceOutput = MapOutput;

/// A map function takes a key-value pair and auxiliary arguments.
///
/// It returns an iterator that yields new key-value pairs.
pub type MapFn = fn(kv: KeyValue, aux: Bytes) -> MapOutput;

/// A reduce function takes in a key, an iterator over every value shuffled
/// to that key, and an auxiliary argument.
pub type ReduceFn =
    fn(key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>, aux: Bytes) -> ReduceOutput;

/// Routes an intermediate key to a worker index in `0..n`.
///
/// Must depend on nothing but `key` and `n`: every worker computes the
/// destination of a key independently and they all have to agree.
pub type PartitionFn = fn(key: &[u8], n: u32) -> u32;

/// A map reduce application: the capability set resolved by name on every
/// worker.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
    pub partition_fn: PartitionFn,
}

impl Workload {
    /// A workload using [`hash_partition`].
    pub fn new(map_fn: MapFn, reduce_fn: ReduceFn) -> Self {
        Self {
            map_fn,
            reduce_fn,
            partition_fn: hash_partition,
        }
    }

    pub fn with_partition(mut self, partition_fn: PartitionFn) -> Self {
        self.partition_fn = partition_fn;
        self
    }
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload").finish_non_exhaustive()
    }
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,

    /// The value.
    pub value: Bytes,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Get the value of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> Bytes {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// Hashes an intermediate key with FNV-1a (zero offset basis), masked to 31 bits.
///
/// Stable across processes and hosts, unlike `std`'s randomly seeded hasher.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// Default partitioner: `ihash(key) % n`.
///
/// `n` is the roster size and is never zero for a valid job; a zero is
/// treated as a single partition.
pub fn hash_partition(key: &[u8], n: u32) -> u32 {
    ihash(key) % n.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ihash_is_stable() {
        // Pinned so that a dependency bump changing the hash is caught:
        // workers built from different commits must still agree.
        assert_eq!(ihash(b""), 0);
        assert_eq!(ihash(b"a"), 42195);
        assert_eq!(ihash(b"k1"), 20253600);
        assert_eq!(ihash(b"k2"), 20254905);
        assert_eq!(ihash(&Bytes::from_static(b"k1")), ihash(b"k1"));
        assert!(ihash(b"some key") <= 0x7fff_ffff);
    }

    #[test]
    fn hash_partition_stays_in_range() {
        for n in 1..16u32 {
            for i in 0..500 {
                let key = format!("key-{i}");
                let p = hash_partition(key.as_bytes(), n);
                assert!(p < n);
                assert_eq!(p, hash_partition(key.as_bytes(), n));
            }
        }
    }

    #[test]
    fn single_partition_takes_every_key() {
        for key in ["", "a", "k1", "k2", "k3"] {
            assert_eq!(hash_partition(key.as_bytes(), 1), 0);
        }
        assert_eq!(hash_partition(b"zero", 0), 0);
    }

    #[test]
    fn key_value_display_is_lossy() {
        let kv = KeyValue::new("k1", Bytes::from_static(&[0x33, 0xff]));
        assert_eq!(kv.to_string(), "k1 3\u{fffd}");
    }
}
