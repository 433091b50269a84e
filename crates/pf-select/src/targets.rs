//! Per-agent path queries to a fixed set of targets (typically players).
//!
//! Unlike node selection nothing is chosen here: callers schedule one batch,
//! then read path status and length per target until they reset.

use pf_batch::{FindPathsJob, JobHandle, PathWorkers, SlotStatus};
use pf_core::{AgentId, IdMap, Vec3};
use pf_navmesh::PathQuery;

use crate::AgentView;

#[derive(Default)]
pub struct TargetPathfindingStatus {
    job:       FindPathsJob,
    handle:    Option<JobHandle>,
    started:   bool,
    /// Target index → batch slot, `None` for targets not queried.
    slots:     Vec<Option<usize>>,
    positions: Vec<Vec3>,
}

impl TargetPathfindingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule one query per `Some` target.  No-op (returns `false`) while a
    /// previous batch has not been reset.
    pub fn start_jobs<Q: PathQuery>(
        &mut self,
        agent: &dyn AgentView,
        targets: &[Option<Vec3>],
        workers: &PathWorkers<Q>,
    ) -> bool {
        if self.started {
            return false;
        }
        self.slots.clear();
        self.positions.clear();
        for target in targets {
            let slot = target.map(|p| {
                self.positions.push(p);
                self.positions.len() - 1
            });
            self.slots.push(slot);
        }

        self.job.initialize(agent.profile(), agent.path_origin(), self.positions.iter().copied(), true);
        self.handle = Some(self.job.schedule(workers));
        self.started = true;
        true
    }

    /// Clear the started flag once the batch has fully drained.  Returns
    /// whether the status is now ready for [`start_jobs`](Self::start_jobs).
    pub fn reset_if_jobs_have_completed(&mut self) -> bool {
        if self.started && self.handle.as_ref().is_none_or(JobHandle::is_completed) {
            self.started = false;
            self.handle = None;
        }
        !self.started
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn slot_for_target(&self, target: usize) -> Option<usize> {
        self.slots.get(target).copied().flatten()
    }

    /// `None` for targets that were not queried.
    pub fn path_status(&self, target: usize) -> Option<SlotStatus> {
        self.slot_for_target(target).map(|slot| self.job.status(slot))
    }

    /// Path length to `target`, once its query has succeeded.
    pub fn path_length(&self, target: usize) -> Option<f32> {
        let slot = self.slot_for_target(target)?;
        self.job.status(slot).is_success().then(|| self.job.path_length(slot))
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }
}

impl Drop for TargetPathfindingStatus {
    fn drop(&mut self) {
        if self.started {
            self.job.cancel();
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub struct AsyncTargetPathfinding<Q: PathQuery> {
    statuses: IdMap<TargetPathfindingStatus>,
    workers:  PathWorkers<Q>,
}

impl<Q: PathQuery> AsyncTargetPathfinding<Q> {
    pub fn new(workers: PathWorkers<Q>) -> Self {
        Self { statuses: IdMap::new(), workers }
    }

    pub fn status(&self, agent_id: AgentId) -> Option<&TargetPathfindingStatus> {
        self.statuses.get(agent_id)
    }

    pub fn start_jobs(&mut self, agent_id: AgentId, agent: &dyn AgentView, targets: &[Option<Vec3>]) -> bool {
        self.statuses
            .get_or_insert_default(agent_id)
            .start_jobs(agent, targets, &self.workers)
    }

    pub fn reset_if_jobs_have_completed(&mut self, agent_id: AgentId) -> bool {
        self.statuses
            .get_mut(agent_id)
            .is_none_or(TargetPathfindingStatus::reset_if_jobs_have_completed)
    }

    pub fn remove_status(&mut self, agent_id: AgentId) {
        self.statuses.reset(agent_id);
    }
}
