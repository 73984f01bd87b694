use anyhow::{bail, Context, Result};
use bytes::Bytes;

use common::{KeyValue, Workload};

use crate::store::OutboundBuffers;

#[derive(Debug)]
pub struct MapSummary {
    pub buffers: OutboundBuffers,
    pub records_processed: u64,
    pub records_emitted: u64,
}

/// Run the workload's map over `records` and bucket every emitted pair by
/// the partition that owns its key.
///
/// The first error from map, or a partition index outside `0..workers`,
/// fails the whole task.
pub fn perform_map(
    workload: &Workload,
    aux: &Bytes,
    records: Vec<KeyValue>,
    workers: u32,
) -> Result<MapSummary> {
    let mut buffers = OutboundBuffers::new(workers);
    let mut records_processed = 0;
    let mut records_emitted = 0;

    for kv in records {
        let input_key = kv.key();
        let emitted = (workload.map_fn)(kv, aux.clone()).with_context(|| {
            format!(
                "map raised on record {}",
                String::from_utf8_lossy(&input_key)
            )
        })?;

        for pair in emitted {
            let pair = pair.with_context(|| {
                format!(
                    "map raised on record {}",
                    String::from_utf8_lossy(&input_key)
                )
            })?;

            let destination = (workload.partition_fn)(&pair.key, workers);
            if destination >= workers {
                bail!(
                    "partition returned {destination} for key {}, roster has {workers} workers",
                    String::from_utf8_lossy(&pair.key)
                );
            }
            buffers.push(destination, pair);
            records_emitted += 1;
        }
        records_processed += 1;
    }

    Ok(MapSummary {
        buffers,
        records_processed,
        records_emitted,
    })
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use common::utils::emit_none;
    use common::{hash_partition, MapOutput};

    use super::*;

    fn records(pairs: &[(&'static str, &'static str)]) -> Vec<KeyValue> {
        pairs.iter().map(|(k, v)| KeyValue::new(*k, *v)).collect()
    }

    #[test]
    fn buckets_by_partition() {
        let sum = workload::try_named("sum").unwrap();
        let input = records(&[("k1", "1"), ("k2", "1"), ("k1", "1"), ("k3", "1")]);

        let summary = perform_map(&sum, &Bytes::new(), input, 2).unwrap();
        assert_eq!(summary.records_processed, 4);
        assert_eq!(summary.records_emitted, 4);

        // k1 and k3 hash to 0, k2 to 1.
        assert_eq!(summary.buffers.counts(), vec![3, 1]);
        for (destination, bucket) in summary.buffers.into_buckets() {
            for kv in bucket {
                assert_eq!(hash_partition(&kv.key, 2), destination);
            }
        }
    }

    #[test]
    fn one_worker_owns_everything() {
        let wc = workload::try_named("wc").unwrap();
        let input = records(&[("f:1", "a b a"), ("f:2", "c")]);

        let summary = perform_map(&wc, &Bytes::new(), input, 1).unwrap();
        assert_eq!(summary.records_emitted, 4);
        assert_eq!(summary.buffers.counts(), vec![4]);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let sum = workload::try_named("sum").unwrap();
        let summary = perform_map(&sum, &Bytes::new(), Vec::new(), 3).unwrap();
        assert_eq!(summary.records_processed, 0);
        assert_eq!(summary.buffers.total(), 0);
    }

    #[test]
    fn map_error_fails_the_task() {
        fn fragile(kv: KeyValue, _aux: Bytes) -> MapOutput {
            if kv.value == "bad" {
                return Err(anyhow!("cannot map"));
            }
            emit_none()
        }
        let workload = Workload::new(fragile, workload::sum::reduce);
        let input = records(&[("r1", "ok"), ("r2", "bad")]);

        let err = perform_map(&workload, &Bytes::new(), input, 2).unwrap_err();
        assert!(format!("{err:#}").contains("cannot map"));
        assert!(format!("{err:#}").contains("r2"));
    }

    #[test]
    fn out_of_range_partition_fails_the_task() {
        fn past_the_end(_key: &[u8], n: u32) -> u32 {
            n
        }
        let workload = workload::try_named("sum")
            .unwrap()
            .with_partition(past_the_end);

        let err = perform_map(&workload, &Bytes::new(), records(&[("k", "1")]), 2).unwrap_err();
        assert!(err.to_string().contains("partition returned 2"));
    }
}
