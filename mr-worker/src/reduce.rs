use anyhow::{Context, Result};
use bytes::Bytes;

use common::{KeyValue, Workload};

#[derive(Debug)]
pub struct ReduceSummary {
    pub results: Vec<KeyValue>,
    pub keys_processed: u64,
}

/// Reduce every group, in the order given. Callers pass groups sorted by key
/// so the output order is stable.
pub fn perform_reduce(
    workload: &Workload,
    aux: &Bytes,
    groups: Vec<(Bytes, Vec<Bytes>)>,
) -> Result<ReduceSummary> {
    let mut results = Vec::new();
    let mut keys_processed = 0;

    for (key, values) in groups {
        let context = || format!("reduce raised on key {}", String::from_utf8_lossy(&key));

        let emitted = (workload.reduce_fn)(key.clone(), Box::new(values.into_iter()), aux.clone())
            .with_context(context)?;
        for pair in emitted {
            results.push(pair.with_context(context)?);
        }
        keys_processed += 1;
    }

    Ok(ReduceSummary {
        results,
        keys_processed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: &'static str, values: &[&'static str]) -> (Bytes, Vec<Bytes>) {
        (
            Bytes::from(key),
            values.iter().map(|v| Bytes::from(*v)).collect(),
        )
    }

    #[test]
    fn reduces_each_group() {
        let sum = workload::try_named("sum").unwrap();
        let groups = vec![group("k1", &["1", "1", "1"]), group("k3", &["1"])];

        let summary = perform_reduce(&sum, &Bytes::new(), groups).unwrap();
        assert_eq!(summary.keys_processed, 2);
        assert_eq!(
            summary.results,
            vec![KeyValue::new("k1", "3"), KeyValue::new("k3", "1")]
        );
    }

    #[test]
    fn reduce_error_names_the_key() {
        let sum = workload::try_named("sum").unwrap();
        let groups = vec![group("k1", &["1"]), group("k2", &["x"])];

        let err = perform_reduce(&sum, &Bytes::new(), groups).unwrap_err();
        assert!(err.to_string().contains("k2"));
    }

    #[test]
    fn no_groups_no_results() {
        let sum = workload::try_named("sum").unwrap();
        let summary = perform_reduce(&sum, &Bytes::new(), Vec::new()).unwrap();
        assert!(summary.results.is_empty());
    }
}
