//! Word count. Reduce with [`crate::sum::reduce`].

use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let s = string_from_bytes(kv.value)?;
    let words = s
        .split_whitespace()
        .map(|w| w.to_string())
        .collect::<Vec<_>>();

    let iter = words
        .into_iter()
        .map(|word| Ok(KeyValue::new(word, Bytes::from_static(b"1"))));
    Ok(Box::new(iter))
}
