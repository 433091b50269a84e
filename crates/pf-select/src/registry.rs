//! Process-wide registry of per-agent selection state.

use log::debug;

use pf_batch::PathWorkers;
use pf_core::{
    AgentId, IdMap, OptimalDistanceBehavior, PathfindingConfig, PurposeId, Vec3,
};
use pf_navmesh::PathQuery;

use crate::{
    AgentSource, AgentView, ChosenNode, DistancePathfindingStatus, LineOfSight, SelectionPolicy,
    SelectionRequest,
};

/// Outcome of [`AsyncDistancePathfinding::retrieve_chosen_node`].
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Retrieval {
    pub node:     Option<ChosenNode>,
    /// `+inf` when nothing was retrieved, or when distances are not reported.
    pub distance: f32,
}

impl Retrieval {
    pub const NONE: Retrieval = Retrieval { node: None, distance: f32::INFINITY };
}

/// Owns one [`DistancePathfindingStatus`] per agent, created on first use.
///
/// All methods run on the simulation thread; the worker pool is the only
/// place work leaves it.
pub struct AsyncDistancePathfinding<Q: PathQuery> {
    statuses: IdMap<DistancePathfindingStatus>,
    workers:  PathWorkers<Q>,
    config:   PathfindingConfig,
    policy:   SelectionPolicy,
}

impl<Q: PathQuery> AsyncDistancePathfinding<Q> {
    pub fn new(workers: PathWorkers<Q>, config: PathfindingConfig) -> Self {
        let policy = SelectionPolicy::from_config(&config);
        Self { statuses: IdMap::new(), workers, config, policy }
    }

    pub fn workers(&self) -> &PathWorkers<Q> {
        &self.workers
    }

    pub fn config(&self) -> &PathfindingConfig {
        &self.config
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn status(&self, agent_id: AgentId) -> Option<&DistancePathfindingStatus> {
        self.statuses.get(agent_id)
    }

    /// See [`DistancePathfindingStatus::start_choosing_node`].
    pub fn start_choosing_node(
        &mut self,
        agent_id: AgentId,
        agent: &dyn AgentView,
        request: SelectionRequest,
    ) -> bool {
        self.statuses
            .get_or_insert_default(agent_id)
            .start_choosing_node(request, agent, &self.workers)
    }

    /// Farthest-first selection.  `cap_distance` of `None` uses the configured
    /// default.
    #[allow(clippy::too_many_arguments)]
    pub fn start_choosing_farthest_node_from_position(
        &mut self,
        agent_id: AgentId,
        agent: &dyn AgentView,
        purpose: PurposeId,
        target: Vec3,
        avoid_line_of_sight: bool,
        offset: u32,
        cap_distance: Option<f32>,
    ) -> bool {
        let request = self.request(purpose, target, true, avoid_line_of_sight, offset, cap_distance);
        self.start_choosing_node(agent_id, agent, request)
    }

    /// Nearest-first selection.  `cap_distance` of `None` uses the configured
    /// default.
    #[allow(clippy::too_many_arguments)]
    pub fn start_choosing_closest_node_to_position(
        &mut self,
        agent_id: AgentId,
        agent: &dyn AgentView,
        purpose: PurposeId,
        target: Vec3,
        avoid_line_of_sight: bool,
        offset: u32,
        cap_distance: Option<f32>,
    ) -> bool {
        let request = self.request(purpose, target, false, avoid_line_of_sight, offset, cap_distance);
        self.start_choosing_node(agent_id, agent, request)
    }

    /// Advance one agent's selections by a frame.
    pub fn update(&mut self, agent_id: AgentId, agent: &dyn AgentView, los: &dyn LineOfSight) {
        if let Some(status) = self.statuses.get_mut(agent_id) {
            status.update(agent.position(), los, &self.policy);
        }
    }

    /// Advance every busy status by a frame.  Statuses of agents `agents` no
    /// longer knows are torn down.  Returns the number of statuses resumed.
    pub fn update_all(&mut self, agents: &dyn AgentSource, los: &dyn LineOfSight) -> usize {
        let mut resumed = 0;
        let mut gone = Vec::new();
        for (id, status) in self.statuses.iter_mut() {
            match agents.agent(id) {
                Some(agent) => {
                    if status.is_busy() {
                        status.update(agent.position(), los, &self.policy);
                        resumed += 1;
                    }
                }
                None => gone.push(id),
            }
        }
        for id in gone {
            self.remove_status(id);
        }
        resumed
    }

    /// Take the agent's published choice.
    ///
    /// Distance is reported only under [`OptimalDistanceBehavior::Set`].
    pub fn retrieve_chosen_node(&mut self, agent_id: AgentId) -> Retrieval {
        let Some(choice) = self.statuses.get_mut(agent_id).and_then(|s| s.retrieve_chosen_node())
        else {
            return Retrieval::NONE;
        };
        let distance = match self.config.effective_distance_behavior() {
            OptimalDistanceBehavior::Set => choice.distance,
            OptimalDistanceBehavior::DontSet => f32::INFINITY,
        };
        Retrieval { node: Some(choice.node), distance }
    }

    /// Tear down an agent's status, canceling anything in flight.  Buffers are
    /// freed once the workers let go.
    pub fn remove_status(&mut self, agent_id: AgentId) {
        if let Some(old) = self.statuses.reset(agent_id) {
            if old.is_busy() {
                debug!("{agent_id}: status removed while busy");
            }
        }
    }

    fn request(
        &self,
        purpose: PurposeId,
        target: Vec3,
        farthest_first: bool,
        avoid_line_of_sight: bool,
        offset: u32,
        cap_distance: Option<f32>,
    ) -> SelectionRequest {
        SelectionRequest {
            purpose,
            target,
            farthest_first,
            avoid_line_of_sight,
            offset,
            cap_distance: cap_distance.unwrap_or(self.config.default_cap_distance),
        }
    }
}
