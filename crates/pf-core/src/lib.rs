//! `pf-core`: foundational types for the async node pathfinding workspace.
//!
//! This crate is a dependency of every other `pf-*` crate.  It has no `pf-*`
//! dependencies of its own and keeps the external ones small (`glam` for
//! vector math, `thiserror`, and `serde`/`serde_json` for the config loader).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `AgentId`, `CandidateId`, `PurposeId`, `PolyRef`, `AgentTypeId` |
//! | [`geo`]         | `Vec3` re-export, polyline length                     |
//! | [`profile`]     | `AgentProfile`, `AreaMask`, area constants            |
//! | [`candidate`]   | `Candidate`, `CandidateList` (shared node snapshot)   |
//! | [`id_map`]      | `IdMap<T>`: dense per-agent registry storage         |
//! | [`capacity`]    | `CapacityBuffer<T>`: grow-only reusable buffer       |
//! | [`config`]      | `PathfindingConfig`, policy enums, JSON loading       |
//! | [`error`]       | `PfError`, `PfResult`                                 |

pub mod candidate;
pub mod capacity;
pub mod config;
pub mod error;
pub mod geo;
pub mod id_map;
pub mod ids;
pub mod profile;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use candidate::{Candidate, CandidateList};
pub use capacity::CapacityBuffer;
pub use config::{FallbackPolicy, OptimalDistanceBehavior, PathfindingConfig, Preset};
pub use error::{PfError, PfResult};
pub use geo::{Vec3, polyline_length};
pub use id_map::IdMap;
pub use ids::{AgentId, AgentTypeId, CandidateId, PolyRef, PurposeId};
pub use profile::{AREA_NOT_WALKABLE, AREA_WALKABLE, AgentProfile, AreaId, AreaMask};
