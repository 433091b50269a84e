//! Runtime configuration for node selection and the path worker pool.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```
//! use pf_core::{FallbackPolicy, PathfindingConfig};
//!
//! let cfg = PathfindingConfig::from_json_str(r#"{ "preset": "vanilla" }"#).unwrap();
//! assert_eq!(cfg.effective_fallback(), FallbackPolicy::Vanilla);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PfError, PfResult, Vec3};

// ── Policy enums ──────────────────────────────────────────────────────────────

/// What node selection does when the batch completes without a winner.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// First candidate in sorted order whose path succeeded, ignoring
    /// line-of-sight rejection.
    BestPathable,
    /// Index 0 of the sorted set, even if its path failed.
    Vanilla,
    /// Stay put: publish the agent's own position.
    DontMove,
}

/// Whether retrieval reports the chosen node's distance to the target.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimalDistanceBehavior {
    Set,
    /// Legacy: leave the distance at +inf.
    DontSet,
}

/// Bundles of behaviour defaults.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    OnlyFixes,
    Vanilla,
}

impl Preset {
    pub fn fallback(self) -> FallbackPolicy {
        match self {
            Preset::OnlyFixes => FallbackPolicy::BestPathable,
            Preset::Vanilla => FallbackPolicy::Vanilla,
        }
    }

    pub fn distance_behavior(self) -> OptimalDistanceBehavior {
        match self {
            Preset::OnlyFixes => OptimalDistanceBehavior::Set,
            Preset::Vanilla => OptimalDistanceBehavior::DontSet,
        }
    }
}

// ── PathfindingConfig ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathfindingConfig {
    /// Supplies the two behaviour knobs below when they are unset.
    pub preset: Preset,

    pub fallback_node_selection: Option<FallbackPolicy>,

    pub optimal_distance_behavior: Option<OptimalDistanceBehavior>,

    /// Path worker thread count.  `None` uses all logical cores.
    pub worker_threads: Option<usize>,

    /// Corridor-search iterations between read-lock yields.  Bounds how long a
    /// pending navmesh write waits on any single worker.
    pub find_path_iterations: u32,

    /// Node budget of one corridor search.
    pub max_path_nodes: usize,

    /// Capacity of one slot's corner buffer.
    pub max_corners: usize,

    /// Half-extent of the box used to map the agent's origin onto the mesh.
    pub origin_search_radius: f32,

    /// Half-extent used to map each destination, and the endpoint tolerance
    /// the last corner must land within.
    pub endpoint_search_radius: f32,

    /// Obstruction layer handed to the line-of-sight primitive.
    pub line_of_sight_layer_mask: u32,

    /// At most this many path segments are ray-cast per candidate.
    pub max_line_of_sight_segments: usize,

    /// Cap distance the convenience start functions use.
    pub default_cap_distance: f32,

    /// Initial capacity hint for the query handle pool.
    pub query_pool_capacity: usize,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            preset:                     Preset::OnlyFixes,
            fallback_node_selection:    None,
            optimal_distance_behavior:  None,
            worker_threads:             None,
            find_path_iterations:       32,
            max_path_nodes:             2048,
            max_corners:                128,
            origin_search_radius:       5.0,
            endpoint_search_radius:     1.5,
            line_of_sight_layer_mask:   0x40000,
            max_line_of_sight_segments: 16,
            default_cap_distance:       60.0,
            query_pool_capacity:        256,
        }
    }
}

impl PathfindingConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> PfResult<Self> {
        let cfg: PathfindingConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn from_json_path(path: &Path) -> PfResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> PfResult<()> {
        if self.find_path_iterations == 0 {
            return Err(PfError::Config("find_path_iterations must be > 0".into()));
        }
        if self.max_path_nodes == 0 {
            return Err(PfError::Config("max_path_nodes must be > 0".into()));
        }
        if self.max_corners < 2 {
            return Err(PfError::Config(format!(
                "max_corners must be >= 2, got {}",
                self.max_corners
            )));
        }
        let positive = |r: f32| r > 0.0;
        if !positive(self.origin_search_radius) || !positive(self.endpoint_search_radius) {
            return Err(PfError::Config("search radii must be positive".into()));
        }
        if self.worker_threads == Some(0) {
            return Err(PfError::Config("worker_threads must be > 0 when set".into()));
        }
        Ok(())
    }

    // ── Effective values ──────────────────────────────────────────────────

    pub fn effective_fallback(&self) -> FallbackPolicy {
        self.fallback_node_selection.unwrap_or_else(|| self.preset.fallback())
    }

    pub fn effective_distance_behavior(&self) -> OptimalDistanceBehavior {
        self.optimal_distance_behavior
            .unwrap_or_else(|| self.preset.distance_behavior())
    }

    pub fn origin_extents(&self) -> Vec3 {
        Vec3::splat(self.origin_search_radius)
    }

    pub fn endpoint_extents(&self) -> Vec3 {
        Vec3::splat(self.endpoint_search_radius)
    }

    /// Squared endpoint tolerance.
    pub fn endpoint_tolerance_sq(&self) -> f32 {
        self.endpoint_search_radius * self.endpoint_search_radius
    }
}
