//! Distributed grep: keeps the lines containing the pattern given as the
//! first auxiliary argument.

use anyhow::anyhow;
use bytes::Bytes;

use common::utils::{emit_none, emit_one, string_from_bytes};
use common::{KeyValue, MapOutput, ReduceOutput};

use crate::decode_aux;

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args = decode_aux(&aux)?;
    let pattern = args
        .first()
        .ok_or_else(|| anyhow!("grep needs a pattern argument"))?;

    let line = string_from_bytes(kv.value())?;
    if line.contains(pattern.as_str()) {
        emit_one(kv)
    } else {
        emit_none()
    }
}

/// Emits every matching line for the key unchanged.
pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> ReduceOutput {
    let lines = values
        .map(|value| Ok(KeyValue::new(key.clone(), value)))
        .collect::<Vec<_>>();
    Ok(Box::new(lines.into_iter()))
}
