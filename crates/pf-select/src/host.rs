//! What the host simulation supplies.
//!
//! Agents, their candidate nodes, and the physics line-of-sight test all live
//! outside this workspace.  These traits are the seams.

use pf_core::{AgentId, AgentProfile, CandidateList, Vec3};

/// Read-only view of one agent at the current frame.
pub trait AgentView {
    fn position(&self) -> Vec3;

    /// Where paths start.  Usually [`position`](Self::position); while the
    /// agent is traversing an off-mesh link it is the link's exit, so paths
    /// continue through the link without stalling.
    fn path_origin(&self) -> Vec3 {
        self.position()
    }

    fn is_on_navmesh(&self) -> bool;

    fn profile(&self) -> AgentProfile;

    /// Current snapshot of the agent's candidate nodes.
    fn candidates(&self) -> CandidateList;
}

/// Lookup of live agents by ID.
pub trait AgentSource {
    /// `None` once the agent has been removed.
    fn agent(&self, id: AgentId) -> Option<&dyn AgentView>;
}

/// Physics obstruction test.
pub trait LineOfSight {
    /// `true` if the segment `start → end` hits anything on `layer_mask`.
    fn linecast(&self, start: Vec3, end: Vec3, layer_mask: u32) -> bool;
}

impl<F> LineOfSight for F
where
    F: Fn(Vec3, Vec3, u32) -> bool,
{
    fn linecast(&self, start: Vec3, end: Vec3, layer_mask: u32) -> bool {
        self(start, end, layer_mask)
    }
}

/// A world with no obstructions.
#[derive(Copy, Clone, Debug, Default)]
pub struct ClearLineOfSight;

impl LineOfSight for ClearLineOfSight {
    fn linecast(&self, _start: Vec3, _end: Vec3, _layer_mask: u32) -> bool {
        false
    }
}

// ── AgentState ────────────────────────────────────────────────────────────────

/// Plain-data [`AgentView`] for hosts that keep agents in a flat table.
#[derive(Clone, Debug)]
pub struct AgentState {
    pub position:    Vec3,
    /// Exit of the off-mesh link being traversed, if any.
    pub link_exit:   Option<Vec3>,
    pub on_navmesh:  bool,
    pub profile:     AgentProfile,
    pub candidates:  CandidateList,
}

impl AgentState {
    pub fn new(position: Vec3, candidates: CandidateList) -> Self {
        Self {
            position,
            link_exit: None,
            on_navmesh: true,
            profile: AgentProfile::default(),
            candidates,
        }
    }
}

impl AgentView for AgentState {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn path_origin(&self) -> Vec3 {
        self.link_exit.unwrap_or(self.position)
    }

    fn is_on_navmesh(&self) -> bool {
        self.on_navmesh
    }

    fn profile(&self) -> AgentProfile {
        self.profile
    }

    fn candidates(&self) -> CandidateList {
        self.candidates.clone()
    }
}

/// A table indexed by `AgentId`; `None` entries are removed agents.
impl AgentSource for [Option<AgentState>] {
    fn agent(&self, id: AgentId) -> Option<&dyn AgentView> {
        self.get(id.index())?.as_ref().map(|a| a as &dyn AgentView)
    }
}

impl AgentSource for Vec<Option<AgentState>> {
    fn agent(&self, id: AgentId) -> Option<&dyn AgentView> {
        self.as_slice().agent(id)
    }
}
