//! Wire contract between the coordinator and workers, and between peers.
//!
//! Messages are plain `prost` structs; the `Worker` service stubs are
//! generated by `build.rs`.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tonic::transport::{Channel, Endpoint};

use crate::KeyValue;

include!(concat!(env!("OUT_DIR"), "/mapreduce.Worker.rs"));

pub use worker_client::WorkerClient;
pub use worker_server::{Worker, WorkerServer};

/// Phase of a worker's state machine.
///
/// Transitions are driven only by coordinator commands; a worker never
/// advances on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WorkerPhase {
    Idle = 0,
    MapRunning = 1,
    MapDone = 2,
    ShuffleRunning = 3,
    ShuffleDone = 4,
    ReduceRunning = 5,
    ReduceDone = 6,
    /// A task failed. Only a reset leaves this phase.
    Failed = 7,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::MapRunning => "map-running",
            WorkerPhase::MapDone => "map-done",
            WorkerPhase::ShuffleRunning => "shuffle-running",
            WorkerPhase::ShuffleDone => "shuffle-done",
            WorkerPhase::ReduceRunning => "reduce-running",
            WorkerPhase::ReduceDone => "reduce-done",
            WorkerPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct KeyValuePair {
    #[prost(bytes = "bytes", tag = "1")]
    pub key: Bytes,
    #[prost(bytes = "bytes", tag = "2")]
    pub value: Bytes,
}

impl From<KeyValue> for KeyValuePair {
    fn from(kv: KeyValue) -> Self {
        Self {
            key: kv.key,
            value: kv.value,
        }
    }
}

impl From<KeyValuePair> for KeyValue {
    fn from(pair: KeyValuePair) -> Self {
        KeyValue {
            key: pair.key,
            value: pair.value,
        }
    }
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct RosterEntry {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(uint32, tag = "3")]
    pub index: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct HealthRequest {}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct HealthResponse {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(bool, tag = "2")]
    pub alive: bool,
    #[prost(enumeration = "WorkerPhase", tag = "3")]
    pub phase: i32,
    /// Id of the job the worker holds state for, `0` when idle.
    #[prost(uint64, tag = "4")]
    pub job_id: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MapTaskRequest {
    #[prost(uint64, tag = "1")]
    pub job_id: u64,
    #[prost(string, tag = "2")]
    pub workload: String,
    #[prost(bytes = "bytes", tag = "3")]
    pub aux: Bytes,
    #[prost(message, repeated, tag = "4")]
    pub roster: Vec<RosterEntry>,
    #[prost(message, repeated, tag = "5")]
    pub records: Vec<KeyValuePair>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct MapTaskResponse {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(uint64, tag = "2")]
    pub records_processed: u64,
    #[prost(uint64, tag = "3")]
    pub records_emitted: u64,
    /// Emitted pairs per destination worker index.
    #[prost(uint64, repeated, tag = "4")]
    pub partition_counts: Vec<u64>,
    /// Wall time spent running map, in milliseconds.
    #[prost(uint64, tag = "5")]
    pub elapsed_ms: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct ShuffleTaskRequest {
    #[prost(uint64, tag = "1")]
    pub job_id: u64,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ShuffleTaskResponse {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(uint64, tag = "2")]
    pub records_kept: u64,
    #[prost(uint64, tag = "3")]
    pub records_sent: u64,
    #[prost(uint32, tag = "4")]
    pub peers_contacted: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShuffleDelivery {
    #[prost(uint64, tag = "1")]
    pub job_id: u64,
    #[prost(string, tag = "2")]
    pub source_id: String,
    #[prost(uint32, tag = "3")]
    pub source_index: u32,
    #[prost(message, repeated, tag = "4")]
    pub pairs: Vec<KeyValuePair>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ShuffleAck {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(uint64, tag = "2")]
    pub records_received: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReduceTaskRequest {
    #[prost(uint64, tag = "1")]
    pub job_id: u64,
    #[prost(string, tag = "2")]
    pub workload: String,
    #[prost(bytes = "bytes", tag = "3")]
    pub aux: Bytes,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ReduceTaskResponse {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(uint64, tag = "2")]
    pub keys_processed: u64,
    #[prost(uint64, tag = "3")]
    pub records_emitted: u64,
    #[prost(uint64, tag = "4")]
    pub elapsed_ms: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct FetchResultsRequest {
    #[prost(uint64, tag = "1")]
    pub job_id: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FetchResultsResponse {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(message, repeated, tag = "2")]
    pub pairs: Vec<KeyValuePair>,
}

#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct ResetRequest {}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ResetResponse {
    #[prost(string, tag = "1")]
    pub worker_id: String,
}

impl HealthResponse {
    /// Decoded phase; unknown values from a newer peer read as `Failed`.
    pub fn worker_phase(&self) -> WorkerPhase {
        WorkerPhase::try_from(self.phase).unwrap_or(WorkerPhase::Failed)
    }
}

/// Client-side transport settings shared by the coordinator and by workers
/// talking to their peers.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_message_size: 64 * 1024 * 1024,
        }
    }
}

/// Build a client for the worker at `address`.
///
/// The channel connects on first use, so an unreachable worker surfaces as
/// an error status on the first call rather than here.
pub fn connect_lazy(
    address: &str,
    config: &ClientConfig,
) -> Result<WorkerClient<Channel>, tonic::transport::Error> {
    let channel = Endpoint::from_shared(address.to_string())?
        .connect_timeout(config.connect_timeout)
        .connect_lazy();

    Ok(WorkerClient::new(channel)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size))
}

pub fn to_wire(pairs: Vec<KeyValue>) -> Vec<KeyValuePair> {
    pairs.into_iter().map(KeyValuePair::from).collect()
}

pub fn from_wire(pairs: Vec<KeyValuePair>) -> Vec<KeyValue> {
    pairs.into_iter().map(KeyValue::from).collect()
}
