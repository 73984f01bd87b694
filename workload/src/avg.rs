//! Mean of numeric values per key, rounded to two decimals.

use anyhow::{anyhow, Context};
use bytes::Bytes;

use common::utils::{emit_none, emit_one, parse_bytes};
use common::{KeyValue, MapOutput, ReduceOutput};

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    parse_bytes::<f64>(&kv.value)
        .with_context(|| format!("bad value for key {}", String::from_utf8_lossy(&kv.key)))?;
    emit_one(kv)
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> ReduceOutput {
    let mut total = 0f64;
    let mut count = 0u64;
    for value in values {
        total += parse_bytes::<f64>(&value)?;
        count += 1;
    }

    if count == 0 {
        return emit_none();
    }

    let mean = total / count as f64;
    if !mean.is_finite() {
        return Err(anyhow!(
            "mean for key {} is not finite",
            String::from_utf8_lossy(&key)
        ));
    }

    emit_one(KeyValue::new(key, format!("{:.2}", mean)))
}
