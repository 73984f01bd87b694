use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use tracing::{debug, error, info};

use common::roster::{Member, Roster};
use common::rpc::{
    self, ClientConfig, FetchResultsRequest, FetchResultsResponse, HealthRequest, HealthResponse,
    MapTaskRequest, MapTaskResponse, ReduceTaskRequest, ReduceTaskResponse, ResetRequest,
    ShuffleTaskRequest, ShuffleTaskResponse,
};
use common::KeyValue;

use crate::error::JobError;
use crate::jobs::{split_input, Job, JobOutcome, JobSpec, JobState, JobStats};
use crate::worker_info::WorkerInfo;
use crate::worker_registry::WorkerRegistry;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Bound on each map, shuffle, reduce, fetch and reset call.
    pub task_timeout: Duration,
    /// Bound on each health probe.
    pub health_timeout: Duration,
    /// Reset every worker after the health check, before mapping.
    pub reset_before_job: bool,
    pub client: ClientConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(60),
            health_timeout: Duration::from_secs(5),
            reset_before_job: true,
            client: ClientConfig::default(),
        }
    }
}

/// Drives jobs across a fixed roster of workers, one phase barrier at a time.
#[derive(Debug, Clone)]
pub struct MRCoordinator {
    registry: WorkerRegistry,
    config: CoordinatorConfig,
}

impl MRCoordinator {
    pub fn new(roster: Roster, config: CoordinatorConfig) -> Result<Self, JobError> {
        let registry = WorkerRegistry::connect(roster, &config.client)?;
        Ok(Self { registry, config })
    }

    pub fn roster(&self) -> &Roster {
        self.registry.roster()
    }

    /// Run one job to completion.
    ///
    /// Fails fast: the first worker to fail any phase aborts the job, and no
    /// later phase is started. Workers are left as they are.
    pub async fn run_job(&self, spec: JobSpec) -> Result<JobOutcome, JobError> {
        let job_id = rand::thread_rng().gen_range(1..=u64::MAX);
        let mut job = Job::new(job_id, spec.workload.as_str());

        info!(
            job_id,
            workload = %spec.workload,
            records = spec.records.len(),
            workers = self.registry.len(),
            "starting job"
        );

        match self.process_job(&mut job, spec).await {
            Ok(outcome) => {
                job.set_state(JobState::Completed);
                info!(job_id, results = outcome.results.len(), "job completed");
                Ok(outcome)
            }
            Err(e) => {
                let failed_in = job.state();
                job.set_state(JobState::Failed);
                error!(job_id, state = %failed_in, "job failed: {e}");
                Err(e)
            }
        }
    }

    async fn process_job(&self, job: &mut Job, spec: JobSpec) -> Result<JobOutcome, JobError> {
        let aux = workload::encode_aux(&spec.aux)
            .map_err(|e| JobError::InvalidJob(format!("cannot encode aux arguments: {e:#}")))?;
        let mut stats = JobStats {
            records_in: spec.records.len() as u64,
            ..JobStats::default()
        };

        enter(job, JobState::HealthCheck);
        self.health_barrier().await?;

        if self.config.reset_before_job {
            enter(job, JobState::Resetting);
            self.reset_barrier().await?;
        }

        enter(job, JobState::Mapping);
        for response in self.map_barrier(job, &aux, spec.records).await? {
            stats.map_emitted += response.records_emitted;
            stats.map_elapsed = stats
                .map_elapsed
                .max(Duration::from_millis(response.elapsed_ms));
        }

        enter(job, JobState::Shuffling);
        for response in self.shuffle_barrier(job).await? {
            stats.shuffle_kept += response.records_kept;
            stats.shuffle_sent += response.records_sent;
        }

        enter(job, JobState::Reducing);
        for response in self.reduce_barrier(job, &aux).await? {
            stats.keys_reduced += response.keys_processed;
            stats.reduce_elapsed = stats
                .reduce_elapsed
                .max(Duration::from_millis(response.elapsed_ms));
        }

        enter(job, JobState::Collecting);
        let mut results = Vec::new();
        for response in self.collect_barrier(job).await? {
            results.extend(rpc::from_wire(response.pairs));
        }
        stats.results = results.len() as u64;

        Ok(JobOutcome {
            job_id: job.id(),
            results,
            stats,
        })
    }

    /// Probe every worker, without side effects. One entry per roster member,
    /// in roster order.
    pub async fn status(&self) -> Vec<(Member, Result<HealthResponse, JobError>)> {
        let probes = self.registry.get_workers().iter().map(|worker| async move {
            let health = self.probe(worker).await;
            (worker.member.clone(), health)
        });
        join_all(probes).await
    }

    /// Return every worker to idle, discarding whatever it holds.
    pub async fn reset_all(&self) -> Result<(), JobError> {
        self.reset_barrier().await
    }

    async fn probe(&self, worker: &WorkerInfo) -> Result<HealthResponse, JobError> {
        let mut client = worker.client();
        let health = worker
            .complete(
                JobState::HealthCheck,
                self.config.health_timeout,
                async move { client.health(HealthRequest {}).await },
            )
            .await?;

        if health.worker_id != worker.id() || !health.alive {
            return Err(JobError::Unavailable {
                state: JobState::HealthCheck,
                worker: worker.id().to_string(),
                reason: format!(
                    "answered as `{}` (alive: {})",
                    health.worker_id, health.alive
                ),
            });
        }
        Ok(health)
    }

    async fn health_barrier(&self) -> Result<Vec<HealthResponse>, JobError> {
        let probes = self
            .registry
            .get_workers()
            .iter()
            .map(|worker| async move { (worker.index(), self.probe(worker).await) });
        self.barrier(JobState::HealthCheck, probes).await
    }

    async fn reset_barrier(&self) -> Result<(), JobError> {
        let limit = self.config.task_timeout;
        let calls = self.registry.get_workers().iter().map(|worker| {
            let mut client = worker.client();
            async move {
                let reset = client.reset(ResetRequest {});
                (
                    worker.index(),
                    worker.complete(JobState::Resetting, limit, reset).await,
                )
            }
        });
        self.barrier(JobState::Resetting, calls).await?;
        Ok(())
    }

    async fn map_barrier(
        &self,
        job: &Job,
        aux: &Bytes,
        records: Vec<KeyValue>,
    ) -> Result<Vec<MapTaskResponse>, JobError> {
        let limit = self.config.task_timeout;
        let roster = self.registry.roster().to_wire();
        let slices = split_input(records, self.registry.len());

        let calls = self
            .registry
            .get_workers()
            .iter()
            .zip(slices)
            .map(|(worker, slice)| {
                debug!(worker = %worker.member, records = slice.len(), "sending map slice");
                let request = MapTaskRequest {
                    job_id: job.id(),
                    workload: job.workload().to_string(),
                    aux: aux.clone(),
                    roster: roster.clone(),
                    records: rpc::to_wire(slice),
                };
                let mut client = worker.client();
                async move {
                    let map = client.run_map(request);
                    (
                        worker.index(),
                        worker.complete(JobState::Mapping, limit, map).await,
                    )
                }
            });
        self.barrier(JobState::Mapping, calls).await
    }

    async fn shuffle_barrier(&self, job: &Job) -> Result<Vec<ShuffleTaskResponse>, JobError> {
        let limit = self.config.task_timeout;
        let job_id = job.id();
        let calls = self.registry.get_workers().iter().map(|worker| {
            let mut client = worker.client();
            async move {
                let shuffle = client.run_shuffle(ShuffleTaskRequest { job_id });
                (
                    worker.index(),
                    worker.complete(JobState::Shuffling, limit, shuffle).await,
                )
            }
        });
        self.barrier(JobState::Shuffling, calls).await
    }

    async fn reduce_barrier(
        &self,
        job: &Job,
        aux: &Bytes,
    ) -> Result<Vec<ReduceTaskResponse>, JobError> {
        let limit = self.config.task_timeout;
        let calls = self.registry.get_workers().iter().map(|worker| {
            let request = ReduceTaskRequest {
                job_id: job.id(),
                workload: job.workload().to_string(),
                aux: aux.clone(),
            };
            let mut client = worker.client();
            async move {
                let reduce = client.run_reduce(request);
                (
                    worker.index(),
                    worker.complete(JobState::Reducing, limit, reduce).await,
                )
            }
        });
        self.barrier(JobState::Reducing, calls).await
    }

    async fn collect_barrier(&self, job: &Job) -> Result<Vec<FetchResultsResponse>, JobError> {
        let limit = self.config.task_timeout;
        let job_id = job.id();
        let calls = self.registry.get_workers().iter().map(|worker| {
            let mut client = worker.client();
            async move {
                let fetch = client.fetch_results(FetchResultsRequest { job_id });
                (
                    worker.index(),
                    worker.complete(JobState::Collecting, limit, fetch).await,
                )
            }
        });
        self.barrier(JobState::Collecting, calls).await
    }

    /// Run one call per worker concurrently and wait for all of them.
    ///
    /// Replies come back in roster order. If any call failed, the failure
    /// that completed first is returned instead.
    async fn barrier<T>(
        &self,
        state: JobState,
        calls: impl Iterator<Item = impl Future<Output = (u32, Result<T, JobError>)>>,
    ) -> Result<Vec<T>, JobError> {
        let mut pending = calls.collect::<FuturesUnordered<_>>();

        let mut replies = Vec::with_capacity(pending.len());
        let mut first_error = None;
        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(reply) => replies.push((index, reply)),
                Err(e) => {
                    debug!(%state, "barrier call failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        replies.sort_by_key(|(index, _)| *index);
        Ok(replies.into_iter().map(|(_, reply)| reply).collect())
    }
}

fn enter(job: &mut Job, state: JobState) {
    info!(job_id = job.id(), from = %job.state(), to = %state, "job state");
    job.set_state(state);
}
