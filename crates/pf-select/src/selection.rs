//! Frame-stepped node selection.
//!
//! # Lifecycle
//!
//! ```text
//! begin ──► Polling ──(winner or exhausted: publish, cancel)──► Draining ──► Finished
//!             ▲   │                                               ▲   │
//!             └───┘ one scan per frame                            └───┘ one check per frame
//! ```
//!
//! A selection publishes at most one [`NodeChoice`], and publishes it before
//! the batch has drained.  An abandoned selection skips straight to
//! `Draining` and publishes nothing.
//!
//! # Scan
//!
//! Every frame the scan walks the sorted candidates from index 0 and re-counts
//! acceptances from scratch.  It stops at the first slot still in progress,
//! so a candidate is never judged before every better-ranked one has been.

use log::{debug, warn};

use pf_batch::{FindPathsJob, JobHandle, PathWorkers, SlotStatus};
use pf_core::{Candidate, FallbackPolicy, PathfindingConfig, PurposeId, Vec3};
use pf_navmesh::{NavLocation, PathQuery};

use crate::{AgentView, LineOfSight, SortedCandidates};

// ── Request / result types ────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SelectionRequest {
    /// Caller-chosen label; a repeat request with the same purpose while one
    /// is pending is a no-op.
    pub purpose:             PurposeId,
    pub target:              Vec3,
    pub farthest_first:      bool,
    pub avoid_line_of_sight: bool,
    /// Skip this many accepted candidates before picking one.
    pub offset:              u32,
    /// Candidates farther than this from the agent are skipped.  `0` = no cap.
    pub cap_distance:        f32,
}

impl SelectionRequest {
    fn cap_sq(&self) -> f32 {
        self.cap_distance * self.cap_distance
    }
}

/// What a selection published.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ChosenNode {
    Candidate(Candidate),
    /// The agent's own position; used when there is nothing to choose from
    /// or the fallback policy says to stay put.
    SelfPosition(Vec3),
}

impl ChosenNode {
    pub fn position(&self) -> Vec3 {
        match self {
            ChosenNode::Candidate(c) => c.position,
            ChosenNode::SelfPosition(p) => *p,
        }
    }

    pub fn candidate(&self) -> Option<Candidate> {
        match self {
            ChosenNode::Candidate(c) => Some(*c),
            ChosenNode::SelfPosition(_) => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct NodeChoice {
    pub node:     ChosenNode,
    /// Straight-line distance from the request target to `node`.
    pub distance: f32,
}

/// Config-derived knobs shared by every selection.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SelectionPolicy {
    pub fallback:                   FallbackPolicy,
    pub line_of_sight_layer_mask:   u32,
    pub max_line_of_sight_segments: usize,
}

impl SelectionPolicy {
    pub fn from_config(config: &PathfindingConfig) -> Self {
        Self {
            fallback:                   config.effective_fallback(),
            line_of_sight_layer_mask:   config.line_of_sight_layer_mask,
            max_line_of_sight_segments: config.max_line_of_sight_segments,
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&PathfindingConfig::default())
    }
}

// ── Scan ──────────────────────────────────────────────────────────────────────

/// Per-slot results the scan reads.  Implemented by [`FindPathsJob`].
pub trait PathResults {
    fn len(&self) -> usize;

    fn status(&self, index: usize) -> SlotStatus;

    /// Run `f` on slot `index`'s corners.
    fn with_corners<R>(&self, index: usize, f: impl FnOnce(&[NavLocation]) -> R) -> R;
}

impl PathResults for FindPathsJob {
    fn len(&self) -> usize {
        FindPathsJob::len(self)
    }

    fn status(&self, index: usize) -> SlotStatus {
        FindPathsJob::status(self, index)
    }

    fn with_corners<R>(&self, index: usize, f: impl FnOnce(&[NavLocation]) -> R) -> R {
        match self.path(index) {
            Some(corners) => f(&corners),
            None => f(&[]),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ScanOutcome {
    /// Sorted index of the chosen candidate.
    Winner(usize),
    /// No winner yet and at least one slot, capped or not, is still in
    /// progress.
    Incomplete,
    /// Every slot resolved and none was accepted at the requested offset.
    Exhausted,
}

/// `true` if any of the first `max_segments - 1` corner-to-corner segments
/// is obstructed.  Segments ending beyond `cap_sq` (squared, `0` = no cap)
/// from `agent_position` end the check.
pub fn path_obstructed(
    corners: &[NavLocation],
    agent_position: Vec3,
    cap_sq: f32,
    los: &dyn LineOfSight,
    layer_mask: u32,
    max_segments: usize,
) -> bool {
    if corners.len() <= 1 {
        return false;
    }
    let mut start = corners[0].position;
    for corner in &corners[1..corners.len().min(max_segments)] {
        let end = corner.position;
        if cap_sq > 0.0 && end.distance_squared(agent_position) > cap_sq {
            break;
        }
        if los.linecast(start, end, layer_mask) {
            return true;
        }
        start = end;
    }
    false
}

/// One frame's pass over the batch.  `positions` is the sorted candidate
/// order the batch was scheduled in.
pub fn scan_candidates<R: PathResults>(
    results: &R,
    positions: &[Vec3],
    request: &SelectionRequest,
    agent_position: Vec3,
    los: &dyn LineOfSight,
    policy: &SelectionPolicy,
) -> ScanOutcome {
    let cap_sq = request.cap_sq();
    let mut remaining = request.offset;
    // Capped slots never win, but the batch is not done until they resolve.
    let mut capped_pending = false;

    for (i, &position) in positions.iter().enumerate().take(results.len()) {
        if cap_sq > 0.0 && position.distance_squared(agent_position) > cap_sq {
            capped_pending |= results.status(i).is_in_progress();
            continue;
        }
        match results.status(i) {
            SlotStatus::InProgress => return ScanOutcome::Incomplete,
            SlotStatus::Failure(_) => continue,
            SlotStatus::Success => {}
        }

        let accepted = results.with_corners(i, |corners| {
            if corners.first().is_none_or(|c| !c.is_valid()) {
                warn!("candidate {i} reported success with no valid first corner; skipping");
                return false;
            }
            !request.avoid_line_of_sight
                || !path_obstructed(
                    corners,
                    agent_position,
                    cap_sq,
                    los,
                    policy.line_of_sight_layer_mask,
                    policy.max_line_of_sight_segments,
                )
        });
        if !accepted {
            continue;
        }
        if remaining == 0 {
            return ScanOutcome::Winner(i);
        }
        remaining -= 1;
    }
    if capped_pending { ScanOutcome::Incomplete } else { ScanOutcome::Exhausted }
}

/// Sorted index to publish once the scan is exhausted.  `None` means publish
/// the agent's own position.
pub fn fallback_candidate<R: PathResults>(results: &R, policy: FallbackPolicy) -> Option<usize> {
    match policy {
        FallbackPolicy::BestPathable => (0..results.len()).find(|&i| results.status(i).is_success()),
        FallbackPolicy::Vanilla => (results.len() > 0).then_some(0),
        FallbackPolicy::DontMove => None,
    }
}

// ── NodeSelection ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Phase {
    Polling,
    Draining,
    Finished,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Resume {
    Running,
    Finished,
}

/// One in-flight selection.  Owns its batch job until finished.
pub struct NodeSelection {
    request:   SelectionRequest,
    job:       FindPathsJob,
    handle:    Option<JobHandle>,
    phase:     Phase,
    published: Option<NodeChoice>,
    frames:    u32,
}

impl NodeSelection {
    /// Sort the agent's candidates and schedule the batch.  No scan happens
    /// until the first [`resume`](Self::resume).
    ///
    /// With no candidates, or an agent off the mesh, the selection finishes
    /// immediately having published the agent's own position at distance 0.
    pub fn begin<Q: PathQuery>(
        request: SelectionRequest,
        agent: &dyn AgentView,
        sorted: &mut SortedCandidates,
        mut job: FindPathsJob,
        workers: &PathWorkers<Q>,
    ) -> Self {
        let candidates = agent.candidates();
        if candidates.is_empty() || !agent.is_on_navmesh() {
            debug!(
                "{}: nothing to choose ({} candidates, on mesh: {})",
                request.purpose,
                candidates.len(),
                agent.is_on_navmesh()
            );
            return Self {
                request,
                job,
                handle: None,
                phase: Phase::Finished,
                published: Some(NodeChoice {
                    node:     ChosenNode::SelfPosition(agent.position()),
                    distance: 0.0,
                }),
                frames: 0,
            };
        }

        sorted.sort_nodes(&candidates, request.target, request.farthest_first);
        job.initialize(
            agent.profile(),
            agent.path_origin(),
            sorted.positions().iter().copied(),
            false,
        );
        let handle = job.schedule(workers);
        debug!("{}: scheduled {} path queries", request.purpose, sorted.len());

        Self { request, job, handle: Some(handle), phase: Phase::Polling, published: None, frames: 0 }
    }

    /// Advance by one frame.
    pub fn resume(
        &mut self,
        agent_position: Vec3,
        sorted: &SortedCandidates,
        los: &dyn LineOfSight,
        policy: &SelectionPolicy,
    ) -> Resume {
        if self.phase == Phase::Polling {
            self.frames += 1;
            let outcome = scan_candidates(
                &self.job,
                sorted.positions(),
                &self.request,
                agent_position,
                los,
                policy,
            );
            let node = match outcome {
                ScanOutcome::Incomplete => return Resume::Running,
                ScanOutcome::Winner(i) => sorted.get(i).map(ChosenNode::Candidate),
                ScanOutcome::Exhausted => {
                    debug!(
                        "{}: no candidate accepted at offset {}; falling back ({:?})",
                        self.request.purpose, self.request.offset, policy.fallback
                    );
                    fallback_candidate(&self.job, policy.fallback)
                        .and_then(|i| sorted.get(i))
                        .map(ChosenNode::Candidate)
                }
            };
            let choice = match node {
                Some(node) => {
                    NodeChoice { node, distance: self.request.target.distance(node.position()) }
                }
                None => NodeChoice { node: ChosenNode::SelfPosition(agent_position), distance: 0.0 },
            };
            debug!(
                "{}: chose {:?} after {} frame(s)",
                self.request.purpose, choice.node, self.frames
            );
            self.published = Some(choice);
            self.job.cancel();
            self.phase = Phase::Draining;
        }

        if self.phase == Phase::Draining {
            if !self.handle.as_ref().is_none_or(JobHandle::is_completed) {
                return Resume::Running;
            }
            self.handle = None;
            self.phase = Phase::Finished;
        }
        Resume::Finished
    }

    /// Stop without publishing.  The selection still drains on later
    /// resumes.
    pub fn abandon(&mut self) {
        if self.phase == Phase::Polling {
            self.job.cancel();
            self.phase = Phase::Draining;
        }
    }

    /// Take the published choice, if any.
    pub fn take_published(&mut self) -> Option<NodeChoice> {
        self.published.take()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn is_polling(&self) -> bool {
        self.phase == Phase::Polling
    }

    pub fn request(&self) -> &SelectionRequest {
        &self.request
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub fn job(&self) -> &FindPathsJob {
        &self.job
    }

    /// Hand the job back for reuse.  Only a finished selection's job is free
    /// of workers.
    pub fn into_job(self) -> FindPathsJob {
        self.job
    }

    pub(crate) fn cancel(&self) {
        self.job.cancel();
    }
}
