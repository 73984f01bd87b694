use std::future::Future;
use std::time::Duration;

use tonic::transport::Channel;
use tonic::{Response, Status};

use common::roster::Member;
use common::rpc::{self, ClientConfig, WorkerClient};

use crate::error::JobError;
use crate::jobs::JobState;

/// A roster member and the client the coordinator talks to it with.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    pub member: Member,

    // Worker Client for gRPC Communication
    client: WorkerClient<Channel>,
}

impl WorkerInfo {
    /// The channel connects lazily; an unreachable worker shows up on the
    /// first call.
    pub fn new(member: Member, config: &ClientConfig) -> Result<Self, JobError> {
        let client = rpc::connect_lazy(&member.address, config).map_err(|e| {
            JobError::InvalidJob(format!("cannot use address of worker {member}: {e}"))
        })?;
        Ok(Self { member, client })
    }

    pub fn id(&self) -> &str {
        &self.member.id
    }

    pub fn index(&self) -> u32 {
        self.member.index
    }

    /// A handle for one call. Clones share the underlying channel.
    pub fn client(&self) -> WorkerClient<Channel> {
        self.client.clone()
    }

    /// Wait at most `limit` for `call`, turning every way it can fail into
    /// the job error for `state`.
    pub async fn complete<T>(
        &self,
        state: JobState,
        limit: Duration,
        call: impl Future<Output = Result<Response<T>, Status>>,
    ) -> Result<T, JobError> {
        match tokio::time::timeout(limit, call).await {
            Err(_) => Err(JobError::Timeout {
                state,
                worker: self.id().to_string(),
                after: limit,
            }),
            Ok(Err(status)) => Err(JobError::from_status(state, self.id(), limit, status)),
            Ok(Ok(response)) => Ok(response.into_inner()),
        }
    }
}
