//! The pluggable navmesh query primitive.
//!
//! # Pluggability
//!
//! Batch jobs drive path queries only through [`PathQuery`], so a host can
//! plug in its own engine's query object.  [`AStarQuery`](crate::AStarQuery)
//! over [`NavMesh`](crate::NavMesh) is the reference implementation.
//!
//! # Call protocol
//!
//! Every method that takes a mesh must be called while holding a read section
//! of the mesh's [`NavMeshLock`](crate::NavMeshLock).  The corridor search is
//! sliced (`begin` → `update`* → `end`) so the caller can yield the read
//! section between slices; the query keeps its own iteration state, and a
//! query must notice on its own if the mesh changed under it.

use pf_core::{AgentProfile, AreaMask, PolyRef, Vec3};

use crate::QueryStatus;

/// A point on the navmesh together with the polygon it lies on.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct NavLocation {
    pub poly:     PolyRef,
    pub position: Vec3,
}

impl NavLocation {
    pub const NULL: NavLocation = NavLocation { poly: PolyRef::INVALID, position: Vec3::ZERO };

    pub fn new(poly: PolyRef, position: Vec3) -> Self {
        Self { poly, position }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.poly.is_valid()
    }
}

impl Default for NavLocation {
    fn default() -> Self {
        Self::NULL
    }
}

/// Reusable per-worker query context.
///
/// Implementations own all scratch memory needed by one search and are reused
/// across many searches.  A handle is used by exactly one thread at a time.
pub trait PathQuery: Send + 'static {
    /// Mesh type this query reads.
    type Mesh: Send + Sync + 'static;

    /// Create a handle whose corridor searches expand at most `max_nodes`
    /// polygons.
    fn with_max_nodes(max_nodes: usize) -> Self;

    /// Nearest point on a polygon traversable by `profile`, searching the box
    /// `point ± extents`.  `None` if nothing qualifies.
    fn map_location(
        &mut self,
        mesh: &Self::Mesh,
        point: Vec3,
        extents: Vec3,
        profile: &AgentProfile,
    ) -> Option<NavLocation>;

    /// Start a corridor search.  Returns `IN_PROGRESS`, or a final status if
    /// the search resolved immediately.
    fn begin_find_path(
        &mut self,
        mesh: &Self::Mesh,
        start: NavLocation,
        end: NavLocation,
        area_mask: AreaMask,
    ) -> QueryStatus;

    /// Run at most `max_iterations` search iterations.
    fn update_find_path(&mut self, mesh: &Self::Mesh, max_iterations: u32) -> QueryStatus;

    /// Finalise the corridor.  Returns the final status and corridor length.
    fn end_find_path(&mut self, mesh: &Self::Mesh) -> (QueryStatus, usize);

    /// String-pull the finalised corridor into at most `max_corners` corners,
    /// written to `corners` (cleared first).
    fn find_straight_path(
        &mut self,
        mesh: &Self::Mesh,
        start: Vec3,
        end: Vec3,
        corners: &mut Vec<NavLocation>,
        max_corners: usize,
    ) -> QueryStatus;
}
