use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use common::roster::Member;
use common::rpc::{self, ShuffleDelivery};
use common::KeyValue;

use crate::core::JobContext;
use crate::error::WorkerError;
use crate::WorkerConfig;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleSummary {
    pub records_sent: u64,
    pub peers_contacted: u32,
}

/// Send every outbound bucket to the worker that owns it.
///
/// Every destination is resolved against the roster before anything is sent.
/// All deliveries then run concurrently and every one is attempted, so peers
/// that were reached keep their data even when another delivery fails. The
/// first failure is returned once every delivery has finished.
pub async fn deliver_all(
    job: Arc<JobContext>,
    source_id: &str,
    outbound: Vec<(u32, Vec<KeyValue>)>,
    config: WorkerConfig,
) -> Result<ShuffleSummary, WorkerError> {
    let targets = outbound
        .into_iter()
        .map(|(destination, pairs)| match job.roster.get(destination) {
            Some(member) => Ok((member.clone(), pairs)),
            None => Err(WorkerError::Delivery {
                peer: format!("#{destination}"),
                reason: "no such roster index".to_string(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut deliveries = JoinSet::new();
    for (member, pairs) in targets {
        let delivery = ShuffleDelivery {
            job_id: job.job_id,
            source_id: source_id.to_string(),
            source_index: job.self_index,
            pairs: rpc::to_wire(pairs),
        };
        deliveries.spawn(deliver(member, delivery, config));
    }

    let mut summary = ShuffleSummary::default();
    let mut first_error = None;

    while let Some(joined) = deliveries.join_next().await {
        let outcome = joined.unwrap_or_else(|e| {
            Err(WorkerError::Delivery {
                peer: "unknown".to_string(),
                reason: e.to_string(),
            })
        });
        match outcome {
            Ok(sent) => {
                summary.records_sent += sent;
                summary.peers_contacted += 1;
            }
            Err(e) => {
                warn!(job_id = job.job_id, "{e}");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

async fn deliver(
    member: Member,
    delivery: ShuffleDelivery,
    config: WorkerConfig,
) -> Result<u64, WorkerError> {
    let sent = delivery.pairs.len() as u64;
    let failed = |reason: String| WorkerError::Delivery {
        peer: member.id.clone(),
        reason,
    };

    let mut client =
        rpc::connect_lazy(&member.address, &config.client).map_err(|e| failed(e.to_string()))?;

    let ack = match timeout(config.peer_timeout, client.receive_shuffle(delivery)).await {
        Err(_) => {
            return Err(failed(format!(
                "no answer within {}s",
                config.peer_timeout.as_secs_f64()
            )))
        }
        Ok(Err(status)) => {
            return Err(failed(format!("{:?}: {}", status.code(), status.message())))
        }
        Ok(Ok(response)) => response.into_inner(),
    };

    if ack.records_received != sent {
        return Err(failed(format!(
            "peer acknowledged {} of {sent} records",
            ack.records_received
        )));
    }

    debug!(peer = %member, records = sent, "delivered shuffle bucket");
    Ok(sent)
}
