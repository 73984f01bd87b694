use common::roster::Roster;
use common::rpc::ClientConfig;

use crate::error::JobError;
use crate::worker_info::WorkerInfo;

/// Registry for workers: one client per roster entry, in roster order.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    roster: Roster,

    /// List of workers, indexed by their roster index.
    worker_list: Vec<WorkerInfo>,
}

impl WorkerRegistry {
    pub fn connect(roster: Roster, config: &ClientConfig) -> Result<Self, JobError> {
        let worker_list = roster
            .iter()
            .map(|member| WorkerInfo::new(member.clone(), config))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            roster,
            worker_list,
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Size of the roster.
    pub fn len(&self) -> u32 {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worker_list.is_empty()
    }

    pub fn get_workers(&self) -> &[WorkerInfo] {
        &self.worker_list
    }

    pub fn get_worker(&self, index: u32) -> Option<&WorkerInfo> {
        self.worker_list.get(index as usize)
    }
}
