//! `pf-select`: choose a destination node for an agent without blocking the
//! simulation thread.
//!
//! A caller asks for "the farthest node from the player that I can reach
//! without crossing a sight line" and polls once per frame until a node is
//! published.  Path queries run on the [`pf_batch`] worker pool; everything in
//! this crate runs on the simulation thread.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                    |
//! |---------------|-------------------------------------------------------------|
//! | [`host`]      | `AgentView`, `AgentSource`, `LineOfSight` host traits      |
//! | [`sorter`]    | `SortedCandidates`: incremental insertion sort             |
//! | [`selection`] | `NodeSelection` state machine, scan + fallback policy      |
//! | [`status`]    | `DistancePathfindingStatus`: one agent's orchestrator     |
//! | [`registry`]  | `AsyncDistancePathfinding`: per-agent status registry     |
//! | [`targets`]   | `TargetPathfindingStatus`, `AsyncTargetPathfinding`        |
//! | [`roaming`]   | `RoamingPathfindingStatus`, `AsyncRoamingPathfinding`      |
//!
//! # Frame protocol
//!
//! ```text
//! start_choosing_node ──► (frame) update ──► … ──► retrieve_chosen_node
//!        │                       │
//!        └ sort, schedule batch  └ scan results, maybe publish, drain
//! ```

pub mod host;
pub mod registry;
pub mod roaming;
pub mod selection;
pub mod sorter;
pub mod status;
pub mod targets;

#[cfg(test)]
mod tests;

pub use host::{AgentSource, AgentState, AgentView, ClearLineOfSight, LineOfSight};
pub use registry::{AsyncDistancePathfinding, Retrieval};
pub use roaming::{AsyncRoamingPathfinding, RoamingPathfindingStatus, RoamingStart};
pub use selection::{
    ChosenNode, NodeChoice, NodeSelection, PathResults, Resume, ScanOutcome, SelectionPolicy,
    SelectionRequest, fallback_candidate, path_obstructed, scan_candidates,
};
pub use sorter::SortedCandidates;
pub use status::DistancePathfindingStatus;
pub use targets::{AsyncTargetPathfinding, TargetPathfindingStatus};
