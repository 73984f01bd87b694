use anyhow::{anyhow, Result};
use bytes::Bytes;

use crate::{KeyValue, MapOutput};

pub fn string_from_bytes(bytes: Bytes) -> Result<String> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Parse an ASCII number out of a value.
pub fn parse_bytes<T>(bytes: &[u8]) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let s = std::str::from_utf8(bytes)?.trim();
    s.parse::<T>()
        .map_err(|e| anyhow!("cannot parse `{s}`: {e}"))
}

/// An output with exactly one pair.
pub fn emit_one(kv: KeyValue) -> MapOutput {
    Ok(Box::new(std::iter::once(Ok(kv))))
}

/// An output with no pairs.
pub fn emit_none() -> MapOutput {
    Ok(Box::new(std::iter::empty()))
}
