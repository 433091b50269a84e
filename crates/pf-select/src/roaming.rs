//! Paths to the unsearched nodes of an agent's roaming search.
//!
//! A roaming search walks a list of nodes and prefers the ones nearest to
//! where it started.  Two batches run per agent: one from the agent (the path
//! it would walk) and, when the search started elsewhere, one from the search
//! start (the distance used to rank the node).
//!
//! Batch slots hold the nodes in reverse order, so node `i` of `n` lives in
//! slot `n - 1 - i`.

use log::debug;

use pf_batch::{FailureReason, FindPathsJob, JobHandle, PathWorkers, SlotStatus};
use pf_core::{AgentId, IdMap, Vec3};
use pf_navmesh::PathQuery;

use crate::AgentView;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RoamingStart {
    /// New batches were scheduled.
    Started,
    /// A previous batch was still running; it has been canceled and the
    /// caller should retry next frame.
    Deferred,
}

#[derive(Default)]
pub struct RoamingPathfindingStatus {
    from_agent:               FindPathsJob,
    from_agent_handle:        Option<JobHandle>,
    from_search_start:        FindPathsJob,
    from_search_start_handle: Option<JobHandle>,
    node_count:               usize,
    started_at_self:          bool,
}

impl RoamingPathfindingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over with `unsearched`, or cancel the running batches if they
    /// have not drained yet.
    ///
    /// `search_start` is `None` when the search began at the agent itself;
    /// distances then come straight from the agent's batch.
    pub fn stop_previous_jobs_and_start_new_ones<Q: PathQuery>(
        &mut self,
        agent: &dyn AgentView,
        unsearched: &[Vec3],
        search_start: Option<Vec3>,
        workers: &PathWorkers<Q>,
    ) -> RoamingStart {
        if !self.is_idle() {
            self.cancel_jobs();
            return RoamingStart::Deferred;
        }
        self.start_jobs(agent, unsearched, search_start, workers);
        RoamingStart::Started
    }

    fn start_jobs<Q: PathQuery>(
        &mut self,
        agent: &dyn AgentView,
        unsearched: &[Vec3],
        search_start: Option<Vec3>,
        workers: &PathWorkers<Q>,
    ) {
        self.node_count = unsearched.len();
        self.started_at_self = search_start.is_none();
        let profile = agent.profile();
        let nodes = unsearched.iter().rev().copied();

        self.from_agent.initialize(profile, agent.path_origin(), nodes.clone(), self.started_at_self);
        self.from_agent_handle = Some(self.from_agent.schedule(workers));

        self.from_search_start_handle = search_start.map(|start| {
            self.from_search_start.initialize(profile, start, nodes, true);
            self.from_search_start.schedule(workers)
        });
        debug!(
            "roaming: {} nodes, {} batch(es)",
            self.node_count,
            1 + usize::from(self.from_search_start_handle.is_some())
        );
    }

    /// `true` once both batches have drained (or none was ever started).
    pub fn is_idle(&self) -> bool {
        [&self.from_agent_handle, &self.from_search_start_handle]
            .into_iter()
            .all(|h| h.as_ref().is_none_or(JobHandle::is_completed))
    }

    pub fn cancel_jobs(&self) {
        self.from_agent.cancel();
        self.from_search_start.cancel();
    }

    /// Batch slot of node `node`.
    pub fn job_index(&self, node: usize) -> Option<usize> {
        self.node_count.checked_sub(node + 1)
    }

    /// Status of the path to `node`.  While ranking by the search start, a
    /// node stays in progress until that distance is known too.
    pub fn path_status(&self, node: usize) -> SlotStatus {
        let Some(slot) = self.job_index(node) else {
            return SlotStatus::Failure(FailureReason::Canceled);
        };
        if !self.started_at_self && self.from_search_start.status(slot).is_in_progress() {
            return SlotStatus::InProgress;
        }
        self.from_agent.status(slot)
    }

    /// Ranking distance of `node`: from the agent when the search started
    /// there, from the search start otherwise.  `0.0` until known.
    pub fn path_distance(&self, node: usize) -> f32 {
        let Some(slot) = self.job_index(node) else {
            return 0.0;
        };
        if self.started_at_self {
            self.from_agent.path_length(slot)
        } else {
            self.from_search_start.path_length(slot)
        }
    }

    pub fn node_position(&self, node: usize) -> Option<Vec3> {
        self.from_agent.destination(self.job_index(node)?)
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn started_at_self(&self) -> bool {
        self.started_at_self
    }

    /// Completion handles of the agent batch and the search-start batch.
    pub fn handles(&self) -> (Option<&JobHandle>, Option<&JobHandle>) {
        (self.from_agent_handle.as_ref(), self.from_search_start_handle.as_ref())
    }
}

impl Drop for RoamingPathfindingStatus {
    fn drop(&mut self) {
        self.cancel_jobs();
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub struct AsyncRoamingPathfinding<Q: PathQuery> {
    statuses: IdMap<RoamingPathfindingStatus>,
    workers:  PathWorkers<Q>,
}

impl<Q: PathQuery> AsyncRoamingPathfinding<Q> {
    pub fn new(workers: PathWorkers<Q>) -> Self {
        Self { statuses: IdMap::new(), workers }
    }

    pub fn status(&self, agent_id: AgentId) -> Option<&RoamingPathfindingStatus> {
        self.statuses.get(agent_id)
    }

    pub fn stop_previous_jobs_and_start_new_ones(
        &mut self,
        agent_id: AgentId,
        agent: &dyn AgentView,
        unsearched: &[Vec3],
        search_start: Option<Vec3>,
    ) -> RoamingStart {
        self.statuses
            .get_or_insert_default(agent_id)
            .stop_previous_jobs_and_start_new_ones(agent, unsearched, search_start, &self.workers)
    }

    pub fn cancel_jobs(&self, agent_id: AgentId) {
        if let Some(status) = self.statuses.get(agent_id) {
            status.cancel_jobs();
        }
    }

    pub fn path_status(&self, agent_id: AgentId, node: usize) -> SlotStatus {
        self.statuses
            .get(agent_id)
            .map_or(SlotStatus::Failure(FailureReason::Canceled), |s| s.path_status(node))
    }

    pub fn path_distance(&self, agent_id: AgentId, node: usize) -> f32 {
        self.statuses.get(agent_id).map_or(0.0, |s| s.path_distance(node))
    }

    /// Drop the agent's status; running batches are canceled.
    pub fn remove_status(&mut self, agent_id: AgentId) {
        self.statuses.reset(agent_id);
    }
}
