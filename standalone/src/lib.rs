//! Runs a workload in a single process, with no network.
//!
//! Partitions keys exactly as a roster of `partitions` workers would and
//! reduces each partition in turn, so for the same input and partition count
//! the output matches a distributed job's, order included.

use anyhow::Result;
use bytes::Bytes;
use tracing::debug;

use common::{KeyValue, Workload};
use mr_worker::map::perform_map;
use mr_worker::reduce::perform_reduce;
use mr_worker::store::IntermediateStore;

pub fn run_local(
    workload: &Workload,
    aux: &Bytes,
    records: Vec<KeyValue>,
    partitions: u32,
) -> Result<Vec<KeyValue>> {
    let partitions = partitions.max(1);
    let summary = perform_map(workload, aux, records, partitions)?;
    debug!(
        processed = summary.records_processed,
        emitted = summary.records_emitted,
        "map done"
    );

    let stores = (0..partitions)
        .map(|_| IntermediateStore::new())
        .collect::<Vec<_>>();
    for (partition, pairs) in summary.buffers.into_buckets() {
        stores[partition as usize].merge(pairs);
    }

    let mut results = Vec::new();
    for store in &stores {
        let reduced = perform_reduce(workload, aux, store.snapshot())?;
        results.extend(reduced.results);
    }
    Ok(results)
}
