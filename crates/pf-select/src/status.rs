//! One agent's node-selection orchestrator.

use log::debug;

use pf_batch::{FindPathsJob, JobHandle, PathWorkers};
use pf_core::{PurposeId, Vec3};
use pf_navmesh::PathQuery;

use crate::{
    AgentView, LineOfSight, NodeChoice, NodeSelection, Resume, SelectionPolicy, SelectionRequest,
    SortedCandidates,
};

/// Finished jobs kept for reuse; a steady agent needs one, a supersede two.
const MAX_SPARE_JOBS: usize = 2;

/// Per-agent state: `Idle` when no purpose is set, `Pending(purpose)`
/// otherwise, until the published choice is retrieved.
///
/// A superseded selection keeps draining in `retiring` so its job can be
/// reused once the workers let go of it.
#[derive(Default)]
pub struct DistancePathfindingStatus {
    purpose:    Option<PurposeId>,
    active:     Option<NodeSelection>,
    retiring:   Vec<NodeSelection>,
    sorted:     SortedCandidates,
    spare_jobs: Vec<FindPathsJob>,
    chosen:     Option<NodeChoice>,
}

impl DistancePathfindingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin choosing a node for `request.purpose`.
    ///
    /// Returns `false` (and does nothing) if that purpose is already pending.
    /// A different pending purpose is superseded: its selection is canceled
    /// without publishing and any unretrieved choice is discarded.
    pub fn start_choosing_node<Q: PathQuery>(
        &mut self,
        request: SelectionRequest,
        agent: &dyn AgentView,
        workers: &PathWorkers<Q>,
    ) -> bool {
        if self.purpose == Some(request.purpose) {
            return false;
        }
        if let Some(mut old) = self.active.take() {
            debug!("{} superseded by {}", old.request().purpose, request.purpose);
            old.abandon();
            self.park(old);
        }
        self.chosen = None;
        self.purpose = Some(request.purpose);

        let job = self.spare_jobs.pop().unwrap_or_default();
        let mut selection = NodeSelection::begin(request, agent, &mut self.sorted, job, workers);
        if let Some(choice) = selection.take_published() {
            self.chosen = Some(choice);
        }
        if selection.is_finished() {
            self.recycle(selection.into_job());
        } else {
            self.active = Some(selection);
        }
        true
    }

    /// Advance every selection this agent owns by one frame.
    pub fn update(&mut self, agent_position: Vec3, los: &dyn LineOfSight, policy: &SelectionPolicy) {
        let mut i = 0;
        while i < self.retiring.len() {
            if self.retiring[i].resume(agent_position, &self.sorted, los, policy) == Resume::Finished {
                let done = self.retiring.swap_remove(i);
                self.recycle(done.into_job());
            } else {
                i += 1;
            }
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };
        let resumed = active.resume(agent_position, &self.sorted, los, policy);
        if let Some(choice) = active.take_published() {
            self.chosen = Some(choice);
        }
        if resumed == Resume::Finished {
            if let Some(done) = self.active.take() {
                self.recycle(done.into_job());
            }
        }
    }

    /// Consume the published choice.  Clears the purpose, so the next start
    /// request with any purpose begins a new selection.
    pub fn retrieve_chosen_node(&mut self) -> Option<NodeChoice> {
        let choice = self.chosen.take()?;
        self.purpose = None;
        Some(choice)
    }

    pub fn purpose(&self) -> Option<PurposeId> {
        self.purpose
    }

    pub fn has_choice(&self) -> bool {
        self.chosen.is_some()
    }

    /// `true` while any selection is polling or draining.
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.retiring.is_empty()
    }

    /// Superseded selections still draining.
    pub fn retiring_count(&self) -> usize {
        self.retiring.len()
    }

    /// Completion handle of the current selection's batch.
    pub fn active_handle(&self) -> Option<&JobHandle> {
        self.active.as_ref().and_then(NodeSelection::handle)
    }

    pub fn sorted(&self) -> &SortedCandidates {
        &self.sorted
    }

    /// Finished jobs held for reuse.
    pub fn spare_job_count(&self) -> usize {
        self.spare_jobs.len()
    }

    fn recycle(&mut self, mut job: FindPathsJob) {
        if self.spare_jobs.len() < MAX_SPARE_JOBS {
            self.spare_jobs.push(job);
        } else if !job.release() {
            debug!("spare job still shared at release");
        }
    }

    fn park(&mut self, selection: NodeSelection) {
        if selection.is_finished() {
            self.recycle(selection.into_job());
        } else {
            self.retiring.push(selection);
        }
    }
}

impl Drop for DistancePathfindingStatus {
    fn drop(&mut self) {
        // Workers drop their share of each job when they notice.
        for selection in self.active.iter().chain(&self.retiring) {
            selection.cancel();
        }
    }
}
