//! Sum of integer values per key.
//!
//! Map passes records through unchanged, so input records are already
//! `(key, count)` pairs.

use anyhow::Context;
use bytes::Bytes;

use common::utils::{emit_one, parse_bytes};
use common::{KeyValue, MapOutput, ReduceOutput};

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    emit_one(kv)
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> ReduceOutput {
    let mut total = 0i64;
    for value in values {
        let n: i64 = parse_bytes(&value)
            .with_context(|| format!("bad count for key {}", String::from_utf8_lossy(&key)))?;
        total = total.checked_add(n).context("sum overflowed i64")?;
    }

    emit_one(KeyValue::new(key, total.to_string()))
}
