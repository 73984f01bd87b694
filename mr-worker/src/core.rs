use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use bytes::Bytes;
use tokio::sync::{Mutex, MutexGuard};
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

use common::roster::Roster;
use common::rpc::{
    self, FetchResultsRequest, FetchResultsResponse, HealthRequest, HealthResponse, MapTaskRequest,
    MapTaskResponse, ReduceTaskRequest, ReduceTaskResponse, ResetRequest, ResetResponse,
    ShuffleAck, ShuffleDelivery, ShuffleTaskRequest, ShuffleTaskResponse, Worker, WorkerPhase,
};
use common::{KeyValue, Workload};
use workload::Registry;

use crate::error::WorkerError;
use crate::store::{IntermediateStore, OutboundBuffers};
use crate::{map, reduce, shuffle, WorkerConfig};

/// Everything a worker holds for the job it accepted in `RunMap`.
///
/// A fresh context, intermediate store included, is allocated when a job's
/// map starts and dropped on reset. Work still holding the old context after
/// a reset writes into a store nobody reads again.
#[derive(Debug)]
pub struct JobContext {
    pub job_id: u64,
    pub roster: Roster,
    pub self_index: u32,
    pub store: IntermediateStore,
}

struct TaskState {
    phase: WorkerPhase,
    /// Bumped by every reset. A task finishing under an older epoch is discarded.
    epoch: u64,
    job: Option<Arc<JobContext>>,
    outbound: OutboundBuffers,
    results: Vec<KeyValue>,
}

impl TaskState {
    fn new() -> Self {
        Self {
            phase: WorkerPhase::Idle,
            epoch: 0,
            job: None,
            outbound: OutboundBuffers::default(),
            results: Vec::new(),
        }
    }

    fn require(&self, command: &'static str, allowed: &[WorkerPhase]) -> Result<(), WorkerError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(WorkerError::InvalidPhase {
                command,
                phase: self.phase,
            })
        }
    }

    fn job(&self, job_id: u64) -> Result<Arc<JobContext>, WorkerError> {
        match &self.job {
            Some(job) if job.job_id == job_id => Ok(Arc::clone(job)),
            other => Err(WorkerError::JobMismatch {
                requested: job_id,
                active: other.as_ref().map_or(0, |job| job.job_id),
            }),
        }
    }

    fn job_id(&self) -> u64 {
        self.job.as_ref().map_or(0, |job| job.job_id)
    }
}

struct Inner {
    id: String,
    workloads: Registry,
    config: WorkerConfig,
    state: Mutex<TaskState>,
}

/// A worker's gRPC service. Cheap to clone; clones share one state machine.
#[derive(Clone)]
pub struct MRWorker {
    inner: Arc<Inner>,
}

impl MRWorker {
    pub fn new(id: impl Into<String>, workloads: Registry, config: WorkerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: id.into(),
                workloads,
                config,
                state: Mutex::new(TaskState::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub async fn phase(&self) -> WorkerPhase {
        self.inner.state.lock().await.phase
    }

    /// Groups received for the current job, sorted by key.
    pub async fn intermediate(&self) -> Vec<(Bytes, Vec<Bytes>)> {
        match &self.inner.state.lock().await.job {
            Some(job) => job.store.snapshot(),
            None => Vec::new(),
        }
    }

    fn workload(&self, name: &str) -> Result<Workload, WorkerError> {
        self.inner
            .workloads
            .get(name)
            .ok_or_else(|| WorkerError::UnknownWorkload(name.to_string()))
    }

    /// Move to `running` if the phase allows `command` and `job_id` is the
    /// job this worker holds. Returns the job and the epoch the task runs under.
    async fn begin(
        &self,
        command: &'static str,
        allowed: WorkerPhase,
        running: WorkerPhase,
        job_id: u64,
    ) -> Result<(Arc<JobContext>, u64, MutexGuard<'_, TaskState>), WorkerError> {
        let mut state = self.inner.state.lock().await;
        state.require(command, &[allowed])?;
        let job = state.job(job_id)?;
        state.phase = running;
        let epoch = state.epoch;
        Ok((job, epoch, state))
    }

    /// Record the end of a task started under `epoch`. The returned guard
    /// lets the caller publish the task's output atomically with the phase.
    async fn finish(
        &self,
        epoch: u64,
        phase: WorkerPhase,
    ) -> Result<MutexGuard<'_, TaskState>, WorkerError> {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            warn!(worker = %self.inner.id, "discarding output of a task superseded by reset");
            return Err(WorkerError::Superseded);
        }
        state.phase = phase;
        Ok(state)
    }
}

#[tonic::async_trait]
impl Worker for MRWorker {
    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let state = self.inner.state.lock().await;
        Ok(Response::new(HealthResponse {
            worker_id: self.inner.id.clone(),
            alive: true,
            phase: state.phase.into(),
            job_id: state.job_id(),
        }))
    }

    async fn run_map(
        &self,
        request: Request<MapTaskRequest>,
    ) -> Result<Response<MapTaskResponse>, Status> {
        let request = request.into_inner();

        let roster = Roster::from_wire(&request.roster).map_err(WorkerError::from)?;
        let self_index = roster
            .index_of(&self.inner.id)
            .ok_or_else(|| WorkerError::NotInRoster(self.inner.id.clone()))?;
        let workload = self.workload(&request.workload)?;
        let workers = roster.len();

        let epoch = {
            let mut state = self.inner.state.lock().await;
            state.require("map", &[WorkerPhase::Idle])?;
            state.job = Some(Arc::new(JobContext {
                job_id: request.job_id,
                roster,
                self_index,
                store: IntermediateStore::new(),
            }));
            state.outbound = OutboundBuffers::default();
            state.results.clear();
            state.phase = WorkerPhase::MapRunning;
            state.epoch
        };

        info!(
            worker = %self.inner.id,
            job_id = request.job_id,
            workload = %request.workload,
            records = request.records.len(),
            "starting map task"
        );

        let records = rpc::from_wire(request.records);
        let aux = request.aux;
        let started = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || {
            map::perform_map(&workload, &aux, records, workers)
        })
        .await
        .map_err(|e| anyhow!("map task did not complete: {e}"))
        .and_then(|summary| summary);

        match outcome {
            Ok(summary) => {
                let mut state = self.finish(epoch, WorkerPhase::MapDone).await?;
                let partition_counts = summary.buffers.counts();
                state.outbound = summary.buffers;
                let elapsed = started.elapsed();
                info!(
                    worker = %self.inner.id,
                    processed = summary.records_processed,
                    emitted = summary.records_emitted,
                    ?elapsed,
                    "map task done"
                );
                Ok(Response::new(MapTaskResponse {
                    worker_id: self.inner.id.clone(),
                    records_processed: summary.records_processed,
                    records_emitted: summary.records_emitted,
                    partition_counts,
                    elapsed_ms: elapsed.as_millis() as u64,
                }))
            }
            Err(e) => {
                drop(self.finish(epoch, WorkerPhase::Failed).await?);
                error!(worker = %self.inner.id, "map task failed: {e:#}");
                Err(WorkerError::Map(e).into())
            }
        }
    }

    async fn run_shuffle(
        &self,
        request: Request<ShuffleTaskRequest>,
    ) -> Result<Response<ShuffleTaskResponse>, Status> {
        let job_id = request.into_inner().job_id;

        let (job, epoch, outbound) = {
            let (job, epoch, mut state) = self
                .begin(
                    "shuffle",
                    WorkerPhase::MapDone,
                    WorkerPhase::ShuffleRunning,
                    job_id,
                )
                .await?;
            let outbound = std::mem::take(&mut state.outbound);
            (job, epoch, outbound)
        };

        let mut records_kept = 0;
        let mut remote = Vec::new();
        for (destination, pairs) in outbound.into_buckets() {
            if destination == job.self_index {
                records_kept += job.store.merge(pairs);
            } else {
                remote.push((destination, pairs));
            }
        }

        info!(
            worker = %self.inner.id,
            job_id,
            kept = records_kept,
            peers = remote.len(),
            "starting shuffle"
        );

        let delivered =
            shuffle::deliver_all(Arc::clone(&job), &self.inner.id, remote, self.inner.config).await;

        match delivered {
            Ok(summary) => {
                drop(self.finish(epoch, WorkerPhase::ShuffleDone).await?);
                info!(
                    worker = %self.inner.id,
                    sent = summary.records_sent,
                    peers = summary.peers_contacted,
                    "shuffle done"
                );
                Ok(Response::new(ShuffleTaskResponse {
                    worker_id: self.inner.id.clone(),
                    records_kept,
                    records_sent: summary.records_sent,
                    peers_contacted: summary.peers_contacted,
                }))
            }
            Err(e) => {
                drop(self.finish(epoch, WorkerPhase::Failed).await?);
                error!(worker = %self.inner.id, "shuffle failed: {e}");
                Err(e.into())
            }
        }
    }

    async fn receive_shuffle(
        &self,
        request: Request<ShuffleDelivery>,
    ) -> Result<Response<ShuffleAck>, Status> {
        let delivery = request.into_inner();

        let job = {
            let state = self.inner.state.lock().await;
            state.require(
                "receive shuffle",
                &[
                    WorkerPhase::MapDone,
                    WorkerPhase::ShuffleRunning,
                    WorkerPhase::ShuffleDone,
                ],
            )?;
            state.job(delivery.job_id)?
        };

        let records_received = job.store.merge(rpc::from_wire(delivery.pairs));
        debug!(
            worker = %self.inner.id,
            source = %delivery.source_id,
            records = records_received,
            "merged shuffle delivery"
        );

        Ok(Response::new(ShuffleAck {
            worker_id: self.inner.id.clone(),
            records_received,
        }))
    }

    async fn run_reduce(
        &self,
        request: Request<ReduceTaskRequest>,
    ) -> Result<Response<ReduceTaskResponse>, Status> {
        let request = request.into_inner();
        let workload = self.workload(&request.workload)?;

        let (job, epoch, state) = self
            .begin(
                "reduce",
                WorkerPhase::ShuffleDone,
                WorkerPhase::ReduceRunning,
                request.job_id,
            )
            .await?;
        drop(state);

        let groups = job.store.snapshot();
        info!(worker = %self.inner.id, job_id = job.job_id, keys = groups.len(), "starting reduce task");

        let aux = request.aux;
        let started = Instant::now();
        let outcome =
            tokio::task::spawn_blocking(move || reduce::perform_reduce(&workload, &aux, groups))
                .await
                .map_err(|e| anyhow!("reduce task did not complete: {e}"))
                .and_then(|summary| summary);

        match outcome {
            Ok(summary) => {
                let mut state = self.finish(epoch, WorkerPhase::ReduceDone).await?;
                let records_emitted = summary.results.len() as u64;
                state.results = summary.results;
                let elapsed = started.elapsed();
                info!(
                    worker = %self.inner.id,
                    keys = summary.keys_processed,
                    emitted = records_emitted,
                    ?elapsed,
                    "reduce task done"
                );
                Ok(Response::new(ReduceTaskResponse {
                    worker_id: self.inner.id.clone(),
                    keys_processed: summary.keys_processed,
                    records_emitted,
                    elapsed_ms: elapsed.as_millis() as u64,
                }))
            }
            Err(e) => {
                drop(self.finish(epoch, WorkerPhase::Failed).await?);
                error!(worker = %self.inner.id, "reduce task failed: {e:#}");
                Err(WorkerError::Reduce(e).into())
            }
        }
    }

    async fn fetch_results(
        &self,
        request: Request<FetchResultsRequest>,
    ) -> Result<Response<FetchResultsResponse>, Status> {
        let job_id = request.into_inner().job_id;
        let state = self.inner.state.lock().await;
        state.require("fetch results", &[WorkerPhase::ReduceDone])?;
        state.job(job_id)?;

        Ok(Response::new(FetchResultsResponse {
            worker_id: self.inner.id.clone(),
            pairs: rpc::to_wire(state.results.clone()),
        }))
    }

    async fn reset(
        &self,
        _request: Request<ResetRequest>,
    ) -> Result<Response<ResetResponse>, Status> {
        let mut state = self.inner.state.lock().await;
        let previous = state.phase;
        let epoch = state.epoch + 1;
        *state = TaskState {
            epoch,
            ..TaskState::new()
        };
        info!(worker = %self.inner.id, %previous, epoch, "reset");

        Ok(Response::new(ResetResponse {
            worker_id: self.inner.id.clone(),
        }))
    }
}
