//! Reference [`PathQuery`]: sliced A* over polygon centres plus a funnel
//! string-puller.
//!
//! Search scratch is sized to the mesh and reset in O(1) per search with an
//! epoch stamp, so a pooled handle reuses its memory across batches.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use pf_core::{AgentProfile, AreaMask, PolyRef, Vec3};

use crate::{NavLocation, NavMesh, PathQuery, QueryStatus};

// ── Search state ──────────────────────────────────────────────────────────────

const OPEN:   u8 = 0;
const CLOSED: u8 = 1;

struct Search {
    start:        NavLocation,
    end:          NavLocation,
    area_mask:    AreaMask,
    generation:   u64,
    status:       QueryStatus,
    /// Closed polygon nearest the destination, for partial results.
    best:         PolyRef,
    best_dist:    f32,
    out_of_nodes: bool,
}

// ── AStarQuery ────────────────────────────────────────────────────────────────

pub struct AStarQuery {
    max_nodes:  usize,
    nodes_used: usize,

    // Per-polygon scratch, valid only where `stamp == epoch`.
    epoch:  u32,
    stamp:  Vec<u32>,
    g:      Vec<f32>,
    parent: Vec<PolyRef>,
    state:  Vec<u8>,

    // Min-heap on f-cost.  Non-negative f32 bit patterns sort like the floats.
    open: BinaryHeap<Reverse<(u32, PolyRef)>>,

    search:   Option<Search>,
    corridor: Vec<PolyRef>,
}

impl AStarQuery {
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Polygon corridor of the last finalised search.
    pub fn corridor(&self) -> &[PolyRef] {
        &self.corridor
    }

    fn reset_scratch(&mut self, poly_count: usize) {
        if self.stamp.len() < poly_count {
            self.stamp.resize(poly_count, 0);
            self.g.resize(poly_count, 0.0);
            self.parent.resize(poly_count, PolyRef::INVALID);
            self.state.resize(poly_count, OPEN);
        }
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.stamp.fill(0);
            self.epoch = 1;
        }
        self.open.clear();
        self.nodes_used = 0;
    }

    #[inline]
    fn visited(&self, poly: PolyRef) -> bool {
        self.stamp[poly.index()] == self.epoch
    }

    fn visit(&mut self, poly: PolyRef, g: f32, parent: PolyRef) {
        let i = poly.index();
        self.stamp[i] = self.epoch;
        self.g[i] = g;
        self.parent[i] = parent;
        self.state[i] = OPEN;
        self.nodes_used += 1;
    }
}

/// Where the search measures from inside `poly`.
#[inline]
fn anchor(mesh: &NavMesh, search: &Search, poly: PolyRef) -> Vec3 {
    if poly == search.start.poly {
        search.start.position
    } else if poly == search.end.poly {
        search.end.position
    } else {
        mesh.center(poly)
    }
}

impl PathQuery for AStarQuery {
    type Mesh = NavMesh;

    fn with_max_nodes(max_nodes: usize) -> Self {
        Self {
            max_nodes: max_nodes.max(1),
            nodes_used: 0,
            epoch: 0,
            stamp: Vec::new(),
            g: Vec::new(),
            parent: Vec::new(),
            state: Vec::new(),
            open: BinaryHeap::new(),
            search: None,
            corridor: Vec::new(),
        }
    }

    fn map_location(
        &mut self,
        mesh: &NavMesh,
        point: Vec3,
        extents: Vec3,
        profile: &AgentProfile,
    ) -> Option<NavLocation> {
        mesh.map_point(point, extents, profile)
    }

    fn begin_find_path(
        &mut self,
        mesh: &NavMesh,
        start: NavLocation,
        end: NavLocation,
        area_mask: AreaMask,
    ) -> QueryStatus {
        self.search = None;
        self.corridor.clear();
        if !mesh.contains(start.poly) || !mesh.contains(end.poly) {
            return QueryStatus::FAILURE | QueryStatus::INVALID_PARAM;
        }
        if !area_mask.allows(mesh.area(start.poly)) || !area_mask.allows(mesh.area(end.poly)) {
            return QueryStatus::FAILURE | QueryStatus::INVALID_PARAM;
        }

        self.reset_scratch(mesh.poly_count());
        self.visit(start.poly, 0.0, PolyRef::INVALID);

        let mut search = Search {
            start,
            end,
            area_mask,
            generation: mesh.generation(),
            status: QueryStatus::IN_PROGRESS,
            best: start.poly,
            best_dist: start.position.distance(end.position),
            out_of_nodes: false,
        };
        if start.poly == end.poly {
            search.status = QueryStatus::SUCCESS;
            search.best = end.poly;
        } else {
            self.open.push(Reverse((search.best_dist.to_bits(), start.poly)));
        }
        let status = search.status;
        self.search = Some(search);
        status
    }

    fn update_find_path(&mut self, mesh: &NavMesh, max_iterations: u32) -> QueryStatus {
        let Some(mut search) = self.search.take() else {
            return QueryStatus::FAILURE | QueryStatus::INVALID_PARAM;
        };
        if !search.status.is_in_progress() {
            let status = search.status;
            self.search = Some(search);
            return status;
        }
        if mesh.generation() != search.generation {
            search.status = QueryStatus::FAILURE | QueryStatus::STALE_MESH;
            let status = search.status;
            self.search = Some(search);
            return status;
        }

        let mut iterations = 0;
        while iterations < max_iterations {
            let Some(Reverse((_, node))) = self.open.pop() else {
                break;
            };
            iterations += 1;
            if self.state[node.index()] == CLOSED {
                continue; // stale heap entry
            }
            self.state[node.index()] = CLOSED;

            if node == search.end.poly {
                search.best = node;
                search.status = QueryStatus::SUCCESS;
                break;
            }
            let here = anchor(mesh, &search, node);
            let h_here = here.distance(search.end.position);
            if h_here < search.best_dist {
                search.best = node;
                search.best_dist = h_here;
            }

            let g_here = self.g[node.index()];
            for (next, _) in mesh.links(node) {
                if !search.area_mask.allows(mesh.area(next)) {
                    continue;
                }
                let pos = anchor(mesh, &search, next);
                let g_next = g_here + here.distance(pos);
                if !self.visited(next) {
                    if self.nodes_used >= self.max_nodes {
                        search.out_of_nodes = true;
                        continue;
                    }
                    self.visit(next, g_next, node);
                } else if self.state[next.index()] == OPEN && g_next < self.g[next.index()] {
                    self.g[next.index()] = g_next;
                    self.parent[next.index()] = node;
                } else {
                    continue;
                }
                let f = g_next + pos.distance(search.end.position);
                self.open.push(Reverse((f.to_bits(), next)));
            }
        }

        if search.status.is_in_progress() && self.open.is_empty() {
            // Destination not reachable within the budget.
            search.status = QueryStatus::SUCCESS | QueryStatus::PARTIAL_RESULT;
        }
        if search.out_of_nodes && !search.status.is_in_progress() {
            search.status |= QueryStatus::OUT_OF_NODES;
        }
        let status = search.status;
        self.search = Some(search);
        status
    }

    fn end_find_path(&mut self, _mesh: &NavMesh) -> (QueryStatus, usize) {
        self.corridor.clear();
        let Some(search) = self.search.take() else {
            return (QueryStatus::FAILURE | QueryStatus::INVALID_PARAM, 0);
        };
        if !search.status.is_success() {
            let status = if search.status.is_in_progress() {
                QueryStatus::FAILURE
            } else {
                search.status
            };
            return (status, 0);
        }

        let mut cur = search.best;
        while cur.is_valid() {
            self.corridor.push(cur);
            cur = self.parent[cur.index()];
        }
        self.corridor.reverse();

        let mut status = search.status;
        if search.best != search.end.poly {
            status |= QueryStatus::PARTIAL_RESULT;
        }
        (status, self.corridor.len())
    }

    fn find_straight_path(
        &mut self,
        mesh: &NavMesh,
        start: Vec3,
        end: Vec3,
        corners: &mut Vec<NavLocation>,
        max_corners: usize,
    ) -> QueryStatus {
        corners.clear();
        if self.corridor.is_empty() || max_corners == 0 {
            return QueryStatus::FAILURE | QueryStatus::INVALID_PARAM;
        }
        if self.corridor.iter().any(|&p| !mesh.contains(p)) {
            return QueryStatus::FAILURE | QueryStatus::STALE_MESH;
        }
        funnel(mesh, &self.corridor, start, end, corners, max_corners)
    }
}

// ── Funnel ────────────────────────────────────────────────────────────────────

/// Twice the signed area of triangle `abc` in the x/z plane.
#[inline]
fn triarea2(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (c.x - a.x) * (b.z - a.z) - (b.x - a.x) * (c.z - a.z)
}

#[inline]
fn same_point(a: Vec3, b: Vec3) -> bool {
    a.distance_squared(b) < 1e-6
}

/// Append a corner unless it repeats the previous one.  Returns `false` once
/// the buffer is full.
fn push_corner(corners: &mut Vec<NavLocation>, loc: NavLocation, max_corners: usize) -> bool {
    if corners.last().is_some_and(|c| same_point(c.position, loc.position)) {
        return true;
    }
    if corners.len() >= max_corners {
        return false;
    }
    corners.push(loc);
    true
}

/// Simple stupid funnel algorithm over the corridor's portals.
///
/// Portal `k` joins `corridor[k]` and `corridor[k+1]`; a final degenerate
/// portal at `end` closes the funnel.  Funnel indices are stored as `k + 1`
/// so index 0 means the start point.
fn funnel(
    mesh: &NavMesh,
    corridor: &[PolyRef],
    start: Vec3,
    end: Vec3,
    corners: &mut Vec<NavLocation>,
    max_corners: usize,
) -> QueryStatus {
    // A partial corridor ends on the polygon nearest the destination.
    let last = corridor[corridor.len() - 1];
    let end = mesh.closest_point(last, end);

    let mut portals: Vec<(Vec3, Vec3)> = Vec::with_capacity(corridor.len());
    for pair in corridor.windows(2) {
        let Some([a, b]) = mesh.portal(pair[0], pair[1]) else {
            return QueryStatus::FAILURE | QueryStatus::STALE_MESH;
        };
        // Orient so the funnel's left side is `left`.
        let from = mesh.center(pair[0]);
        if triarea2(from, a, b) > 0.0 { portals.push((a, b)) } else { portals.push((b, a)) }
    }
    portals.push((end, end));

    let poly_at = |k: usize| corridor[k.min(corridor.len() - 1)];
    let mut status = QueryStatus::SUCCESS;

    if !push_corner(corners, NavLocation::new(corridor[0], start), max_corners) {
        return status | QueryStatus::BUFFER_TOO_SMALL;
    }

    let (mut apex, mut left, mut right) = (start, start, start);
    let (mut apex_i, mut left_i, mut right_i) = (0usize, 0usize, 0usize);
    let mut i = 0;
    while i < portals.len() {
        let (pl, pr) = portals[i];

        // Right side.
        if triarea2(apex, right, pr) <= 0.0 {
            if same_point(apex, right) || triarea2(apex, left, pr) > 0.0 {
                right = pr;
                right_i = i + 1;
            } else {
                apex = left;
                apex_i = left_i;
                if !push_corner(corners, NavLocation::new(poly_at(apex_i), apex), max_corners) {
                    return status | QueryStatus::BUFFER_TOO_SMALL;
                }
                (left, right) = (apex, apex);
                (left_i, right_i) = (apex_i, apex_i);
                i = apex_i;
                continue;
            }
        }

        // Left side.
        if triarea2(apex, left, pl) >= 0.0 {
            if same_point(apex, left) || triarea2(apex, right, pl) < 0.0 {
                left = pl;
                left_i = i + 1;
            } else {
                apex = right;
                apex_i = right_i;
                if !push_corner(corners, NavLocation::new(poly_at(apex_i), apex), max_corners) {
                    return status | QueryStatus::BUFFER_TOO_SMALL;
                }
                (left, right) = (apex, apex);
                (left_i, right_i) = (apex_i, apex_i);
                i = apex_i;
                continue;
            }
        }

        i += 1;
    }

    if !push_corner(corners, NavLocation::new(last, end), max_corners) {
        status |= QueryStatus::BUFFER_TOO_SMALL;
    }
    status
}
