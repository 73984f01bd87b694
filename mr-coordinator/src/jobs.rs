use std::fmt;
use std::time::Duration;

use common::KeyValue;

/// State of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Job not started.
    Pending,

    /// Probing every worker.
    HealthCheck,

    /// Clearing what workers hold from earlier jobs.
    Resetting,

    /// Mapping phase.
    Mapping,

    /// Workers exchanging intermediate pairs.
    Shuffling,

    /// Reducing phase.
    Reducing,

    /// Gathering every worker's results.
    Collecting,

    /// Job completed.
    Completed,

    /// Job aborted.
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::HealthCheck => "health-check",
            JobState::Resetting => "resetting",
            JobState::Mapping => "mapping",
            JobState::Shuffling => "shuffling",
            JobState::Reducing => "reducing",
            JobState::Collecting => "collecting",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to run: a workload name, its auxiliary arguments and the input.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub workload: String,
    pub aux: Vec<String>,
    pub records: Vec<KeyValue>,
}

impl JobSpec {
    pub fn new(workload: impl Into<String>, records: Vec<KeyValue>) -> Self {
        Self {
            workload: workload.into(),
            aux: Vec::new(),
            records,
        }
    }

    pub fn with_aux(mut self, aux: Vec<String>) -> Self {
        self.aux = aux;
        self
    }
}

/// A job context.
#[derive(Debug, Clone)]
pub struct Job {
    /// Sent with every command so workers can drop stale traffic.
    id: u64,

    /// The current state of the job.
    state: JobState,

    /// The intended workload to be run for the job.
    workload: String,
}

impl Job {
    pub fn new(id: u64, workload: impl Into<String>) -> Self {
        Self {
            id,
            state: JobState::Pending,
            workload: workload.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn workload(&self) -> &str {
        &self.workload
    }

    pub fn set_state(&mut self, state: JobState) {
        self.state = state;
    }
}

/// Counts summed over every worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Map time of the slowest worker.
    pub map_elapsed: Duration,
    /// Reduce time of the slowest worker.
    pub reduce_elapsed: Duration,
    pub records_in: u64,
    pub map_emitted: u64,
    pub shuffle_kept: u64,
    pub shuffle_sent: u64,
    pub keys_reduced: u64,
    pub results: u64,
}

/// A completed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: u64,
    /// Every worker's results, concatenated in roster order.
    pub results: Vec<KeyValue>,
    pub stats: JobStats,
}

/// Cut `records` into `n` contiguous slices, preserving order.
///
/// Every slice but the last holds `len / n` records; the last one also
/// takes the remainder. With fewer records than slices the leading slices
/// are empty.
pub fn split_input<T>(mut records: Vec<T>, n: u32) -> Vec<Vec<T>> {
    let n = n.max(1) as usize;
    let chunk = records.len() / n;

    let mut slices = Vec::with_capacity(n);
    for _ in 1..n {
        let rest = records.split_off(chunk);
        slices.push(records);
        records = rest;
    }
    slices.push(records);
    slices
}
