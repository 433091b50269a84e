//! Reference navmesh and builder.
//!
//! # Data layout
//!
//! Polygons are axis-aligned rectangles in the x/z plane at a constant height.
//! Links between polygons use **Compressed Sparse Row (CSR)** format: the links
//! leaving polygon `p` occupy
//!
//! ```text
//! link_to[ link_start[p] .. link_start[p+1] ]
//! ```
//!
//! with the shared edge of each link in `link_portal` at the same index.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) of polygon bounding boxes answers the
//! point-to-polygon mapping queries used for origins and destinations.
//!
//! # Mutation
//!
//! The only mutation is [`NavMesh::set_area`], standing in for a region
//! rebuild.  Every mutation bumps [`generation`](NavMesh::generation) so
//! sliced searches can detect that the mesh changed between slices.

use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;

use pf_core::{AREA_WALKABLE, AgentProfile, AgentTypeId, AreaId, PolyRef, Vec3};

use crate::{NavLocation, NavMeshError, NavMeshResult};

/// Largest height difference bridged by a link.
const MAX_CLIMB: f32 = 0.5;

/// Edge coordinates are bucketed at millimetre resolution.
const QUANT: f32 = 1000.0;

/// Minimum overlap for two edges to form a portal.
const MIN_PORTAL_WIDTH: f32 = 1e-3;

// ── R-tree polygon entry ──────────────────────────────────────────────────────

#[derive(Clone)]
struct PolyEntry {
    min: [f32; 3],
    max: [f32; 3],
    poly: PolyRef,
}

impl RTreeObject for PolyEntry {
    type Envelope = AABB<[f32; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

// ── NavMesh ───────────────────────────────────────────────────────────────────

/// Rectangular-polygon navmesh with CSR adjacency and a spatial index.
///
/// Do not construct directly; use [`NavMeshBuilder`].
pub struct NavMesh {
    agent_type: AgentTypeId,
    generation: u64,

    // ── Polygon data (indexed by PolyRef) ─────────────────────────────────
    /// `[x, z]` lower corner.
    pub poly_min: Vec<[f32; 2]>,
    /// `[x, z]` upper corner.
    pub poly_max: Vec<[f32; 2]>,
    pub poly_height: Vec<f32>,
    poly_area: Vec<AreaId>,

    // ── CSR links ─────────────────────────────────────────────────────────
    /// Length = `poly_count + 1`.
    pub link_start: Vec<u32>,
    pub link_to: Vec<PolyRef>,
    /// Endpoints of the shared edge, in no particular order.
    pub link_portal: Vec<[Vec3; 2]>,

    spatial_idx: RTree<PolyEntry>,
}

impl NavMesh {
    // ── Dimensions ────────────────────────────────────────────────────────

    pub fn poly_count(&self) -> usize {
        self.poly_area.len()
    }

    pub fn link_count(&self) -> usize {
        self.link_to.len()
    }

    pub fn agent_type(&self) -> AgentTypeId {
        self.agent_type
    }

    /// Mutation counter; changes whenever polygon data changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn contains(&self, poly: PolyRef) -> bool {
        poly.index() < self.poly_count()
    }

    // ── Polygon accessors ─────────────────────────────────────────────────

    #[inline]
    pub fn area(&self, poly: PolyRef) -> AreaId {
        self.poly_area[poly.index()]
    }

    #[inline]
    pub fn center(&self, poly: PolyRef) -> Vec3 {
        let (lo, hi) = (self.poly_min[poly.index()], self.poly_max[poly.index()]);
        Vec3::new(
            (lo[0] + hi[0]) * 0.5,
            self.poly_height[poly.index()],
            (lo[1] + hi[1]) * 0.5,
        )
    }

    /// Closest point on `poly` to `p`.
    pub fn closest_point(&self, poly: PolyRef, p: Vec3) -> Vec3 {
        let (lo, hi) = (self.poly_min[poly.index()], self.poly_max[poly.index()]);
        Vec3::new(
            p.x.clamp(lo[0], hi[0]),
            self.poly_height[poly.index()],
            p.z.clamp(lo[1], hi[1]),
        )
    }

    /// Iterator over `(neighbour, link index)` for all links leaving `poly`.
    #[inline]
    pub fn links(&self, poly: PolyRef) -> impl Iterator<Item = (PolyRef, usize)> + '_ {
        let start = self.link_start[poly.index()] as usize;
        let end   = self.link_start[poly.index() + 1] as usize;
        (start..end).map(|l| (self.link_to[l], l))
    }

    /// Shared edge between two adjacent polygons.
    pub fn portal(&self, from: PolyRef, to: PolyRef) -> Option<[Vec3; 2]> {
        self.links(from)
            .find(|&(n, _)| n == to)
            .map(|(_, l)| self.link_portal[l])
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Map `point` to the nearest point on a polygon `profile` may enter,
    /// searching the box `point ± extents`.
    ///
    /// Ties break towards the lower `PolyRef` so results are deterministic.
    pub fn map_point(
        &self,
        point: Vec3,
        extents: Vec3,
        profile: &AgentProfile,
    ) -> Option<NavLocation> {
        if profile.agent_type != self.agent_type {
            return None;
        }
        let lo = point - extents;
        let hi = point + extents;
        let query = AABB::from_corners([lo.x, lo.y, lo.z], [hi.x, hi.y, hi.z]);

        let mut best: Option<(f32, NavLocation)> = None;
        for entry in self.spatial_idx.locate_in_envelope_intersecting(&query) {
            if !profile.area_mask.allows(self.area(entry.poly)) {
                continue;
            }
            let on_poly = self.closest_point(entry.poly, point);
            let d2 = on_poly.distance_squared(point);
            let better = match best {
                None => true,
                Some((bd2, loc)) => d2 < bd2 || (d2 == bd2 && entry.poly < loc.poly),
            };
            if better {
                best = Some((d2, NavLocation::new(entry.poly, on_poly)));
            }
        }
        best.map(|(_, loc)| loc)
    }

    /// All polygons whose footprint intersects the x/z box `[min, max]`.
    pub fn polys_in_box(&self, min: Vec3, max: Vec3) -> Vec<PolyRef> {
        let query = AABB::from_corners([min.x, min.y, min.z], [max.x, max.y, max.z]);
        let mut polys: Vec<PolyRef> = self
            .spatial_idx
            .locate_in_envelope_intersecting(&query)
            .map(|e| e.poly)
            .collect();
        polys.sort_unstable();
        polys
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Change the area category of `poly`.  Returns the previous area.
    pub fn set_area(&mut self, poly: PolyRef, area: AreaId) -> NavMeshResult<AreaId> {
        if !self.contains(poly) {
            return Err(NavMeshError::PolyNotFound(poly));
        }
        if area >= 32 {
            return Err(NavMeshError::InvalidArea(area));
        }
        let prev = std::mem::replace(&mut self.poly_area[poly.index()], area);
        self.generation += 1;
        Ok(prev)
    }
}

// ── NavMeshBuilder ────────────────────────────────────────────────────────────

/// Construct a [`NavMesh`] from rectangles, then call [`build`](Self::build).
///
/// Rectangles that share an edge segment (and are within climbing height of
/// each other) are linked in both directions.
///
/// # Example
///
/// ```
/// use pf_core::AREA_WALKABLE;
/// use pf_navmesh::NavMeshBuilder;
///
/// let mut b = NavMeshBuilder::new();
/// b.add_rect(0.0, 0.0, 1.0, 1.0, 0.0, AREA_WALKABLE);
/// b.add_rect(1.0, 0.0, 2.0, 1.0, 0.0, AREA_WALKABLE);
/// let mesh = b.build().unwrap();
/// assert_eq!(mesh.poly_count(), 2);
/// assert_eq!(mesh.link_count(), 2); // one link each way
/// ```
pub struct NavMeshBuilder {
    agent_type: AgentTypeId,
    rects:      Vec<RawRect>,
}

#[derive(Copy, Clone)]
struct RawRect {
    x0: f32,
    z0: f32,
    x1: f32,
    z1: f32,
    y:  f32,
    area: AreaId,
}

/// One polygon edge lying on a quantised axis-aligned line.
#[derive(Copy, Clone)]
struct EdgeSpan {
    poly:  u32,
    lo:    f32,
    hi:    f32,
    /// `true` for the polygon's upper edge (max x / max z).
    upper: bool,
}

struct RawLink {
    from:   u32,
    to:     u32,
    portal: [Vec3; 2],
}

impl NavMeshBuilder {
    pub fn new() -> Self {
        Self { agent_type: AgentProfile::HUMANOID, rects: Vec::new() }
    }

    pub fn agent_type(mut self, agent_type: AgentTypeId) -> Self {
        self.agent_type = agent_type;
        self
    }

    /// Add a rectangle spanning `[x0, x1] × [z0, z1]` at height `y`.
    pub fn add_rect(&mut self, x0: f32, z0: f32, x1: f32, z1: f32, y: f32, area: AreaId) -> PolyRef {
        let id = PolyRef(self.rects.len() as u32);
        self.rects.push(RawRect { x0, z0, x1, z1, y, area });
        id
    }

    /// Convenience: a `cols × rows` grid of unit-`cell` walkable squares whose
    /// lower corner is `origin`.  Returns the refs row-major.
    pub fn add_grid(&mut self, origin: Vec3, cols: usize, rows: usize, cell: f32) -> Vec<PolyRef> {
        let mut refs = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            for c in 0..cols {
                let x0 = origin.x + c as f32 * cell;
                let z0 = origin.z + r as f32 * cell;
                refs.push(self.add_rect(x0, z0, x0 + cell, z0 + cell, origin.y, AREA_WALKABLE));
            }
        }
        refs
    }

    pub fn poly_count(&self) -> usize {
        self.rects.len()
    }

    /// Consume the builder and produce a [`NavMesh`].
    ///
    /// Adjacency is discovered by bucketing every polygon edge by its
    /// quantised line coordinate, so construction is O(P + L) rather than
    /// O(P²) for P polygons and L links.
    pub fn build(self) -> NavMeshResult<NavMesh> {
        if self.rects.len() >= u32::MAX as usize {
            return Err(NavMeshError::TooManyPolys);
        }
        for (index, r) in self.rects.iter().enumerate() {
            let finite = [r.x0, r.z0, r.x1, r.z1, r.y].iter().all(|v| v.is_finite());
            if !finite || r.x1 <= r.x0 || r.z1 <= r.z0 {
                return Err(NavMeshError::DegenerateRect {
                    index,
                    x0: r.x0,
                    z0: r.z0,
                    x1: r.x1,
                    z1: r.z1,
                });
            }
            if r.area >= 32 {
                return Err(NavMeshError::InvalidArea(r.area));
            }
        }

        // Edges on lines of constant x, and lines of constant z.
        let mut x_lines: FxHashMap<i64, Vec<EdgeSpan>> = FxHashMap::default();
        let mut z_lines: FxHashMap<i64, Vec<EdgeSpan>> = FxHashMap::default();
        for (i, r) in self.rects.iter().enumerate() {
            let poly = i as u32;
            x_lines.entry(quantise(r.x0)).or_default().push(EdgeSpan { poly, lo: r.z0, hi: r.z1, upper: false });
            x_lines.entry(quantise(r.x1)).or_default().push(EdgeSpan { poly, lo: r.z0, hi: r.z1, upper: true });
            z_lines.entry(quantise(r.z0)).or_default().push(EdgeSpan { poly, lo: r.x0, hi: r.x1, upper: false });
            z_lines.entry(quantise(r.z1)).or_default().push(EdgeSpan { poly, lo: r.x0, hi: r.x1, upper: true });
        }

        let mut raw: Vec<RawLink> = Vec::new();
        for (key, spans) in &x_lines {
            let x = *key as f32 / QUANT;
            pair_spans(&self.rects, spans, &mut raw, |t, y| Vec3::new(x, y, t));
        }
        for (key, spans) in &z_lines {
            let z = *key as f32 / QUANT;
            pair_spans(&self.rects, spans, &mut raw, |t, y| Vec3::new(t, y, z));
        }

        // Hash-map iteration order is arbitrary; sort for a deterministic CSR.
        raw.sort_unstable_by_key(|l| (l.from, l.to));

        let poly_count = self.rects.len();
        let mut link_start = vec![0u32; poly_count + 1];
        for l in &raw {
            link_start[l.from as usize + 1] += 1;
        }
        for i in 1..=poly_count {
            link_start[i] += link_start[i - 1];
        }
        debug_assert_eq!(link_start[poly_count] as usize, raw.len());

        let link_to:     Vec<PolyRef>   = raw.iter().map(|l| PolyRef(l.to)).collect();
        let link_portal: Vec<[Vec3; 2]> = raw.iter().map(|l| l.portal).collect();

        let entries: Vec<PolyEntry> = self
            .rects
            .iter()
            .enumerate()
            .map(|(i, r)| PolyEntry {
                min: [r.x0, r.y, r.z0],
                max: [r.x1, r.y, r.z1],
                poly: PolyRef(i as u32),
            })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        Ok(NavMesh {
            agent_type: self.agent_type,
            generation: 0,
            poly_min: self.rects.iter().map(|r| [r.x0, r.z0]).collect(),
            poly_max: self.rects.iter().map(|r| [r.x1, r.z1]).collect(),
            poly_height: self.rects.iter().map(|r| r.y).collect(),
            poly_area: self.rects.iter().map(|r| r.area).collect(),
            link_start,
            link_to,
            link_portal,
            spatial_idx,
        })
    }
}

impl Default for NavMeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn quantise(v: f32) -> i64 {
    (v * QUANT).round() as i64
}

/// Link every upper edge on a line to every lower edge it overlaps.
/// `point(t, y)` maps a coordinate along the line back to world space.
fn pair_spans<F>(rects: &[RawRect], spans: &[EdgeSpan], out: &mut Vec<RawLink>, point: F)
where
    F: Fn(f32, f32) -> Vec3,
{
    for a in spans.iter().filter(|s| s.upper) {
        for b in spans.iter().filter(|s| !s.upper) {
            let (ra, rb) = (&rects[a.poly as usize], &rects[b.poly as usize]);
            if (ra.y - rb.y).abs() > MAX_CLIMB {
                continue;
            }
            let lo = a.lo.max(b.lo);
            let hi = a.hi.min(b.hi);
            if hi - lo < MIN_PORTAL_WIDTH {
                continue;
            }
            let y = (ra.y + rb.y) * 0.5;
            let portal = [point(lo, y), point(hi, y)];
            out.push(RawLink { from: a.poly, to: b.poly, portal });
            out.push(RawLink { from: b.poly, to: a.poly, portal });
        }
    }
}
