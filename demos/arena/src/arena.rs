//! Synthetic arena: a walled grid of unit cells plus an unreachable island.
//!
//! ```text
//!  z
//!  32 ┌────────────────────────────────┐
//!     │        ██                      │      ┌──┐
//!     │        ██        ██████████    │      │  │ island
//!     │        ██                      │      └──┘
//!     │   ████████          ██         │
//!     │                     ██ door    │
//!   0 └────────────────────────────────┘ x
//! ```

use pf_core::{AREA_NOT_WALKABLE, AREA_WALKABLE, PolyRef, Vec3};
use pf_navmesh::{NavMesh, NavMeshBuilder, NavMeshResult};

pub const SIZE: usize = 32;

/// Wall rects `[x0, z0, x1, z1]` in cell units.
const WALLS: [[f32; 4]; 4] = [
    [8.0, 18.0, 10.0, 30.0],
    [3.0, 10.0, 11.0, 12.0],
    [17.0, 22.0, 27.0, 24.0],
    [20.0, 2.0, 22.0, 14.0],
];

/// Wall cell that opens and closes while the demo runs.
const DOOR: (usize, usize) = (20, 8);

const ISLAND: [f32; 4] = [40.0, 4.0, 44.0, 8.0];

pub struct Arena {
    pub door:   PolyRef,
    /// Centres of walkable cells.
    pub open:   Vec<Vec3>,
    /// Centre of the island; on the mesh but unreachable.
    pub island: Vec3,
}

pub fn build_arena() -> NavMeshResult<(NavMesh, Arena)> {
    let mut b = NavMeshBuilder::new();
    let mut open = Vec::new();
    let mut door = PolyRef::INVALID;

    for row in 0..SIZE {
        for col in 0..SIZE {
            let (x0, z0) = (col as f32, row as f32);
            let centre = Vec3::new(x0 + 0.5, 0.0, z0 + 0.5);
            let walled = (col, row) == DOOR || WALLS.iter().any(|w| inside(w, centre));
            let area = if walled { AREA_NOT_WALKABLE } else { AREA_WALKABLE };
            let poly = b.add_rect(x0, z0, x0 + 1.0, z0 + 1.0, 0.0, area);
            if (col, row) == DOOR {
                door = poly;
            } else if !walled {
                open.push(centre);
            }
        }
    }
    let [x0, z0, x1, z1] = ISLAND;
    b.add_rect(x0, z0, x1, z1, 0.0, AREA_WALKABLE);
    let island = Vec3::new((x0 + x1) * 0.5, 0.0, (z0 + z1) * 0.5);

    Ok((b.build()?, Arena { door, open, island }))
}

/// Line-of-sight test against the static walls, in the x/z plane.
pub fn walls_block(a: Vec3, b: Vec3) -> bool {
    WALLS.iter().any(|w| segment_hits_rect(a, b, w))
}

fn inside(rect: &[f32; 4], p: Vec3) -> bool {
    p.x >= rect[0] && p.x <= rect[2] && p.z >= rect[1] && p.z <= rect[3]
}

/// Slab test of segment `a → b` against an axis-aligned rect.
fn segment_hits_rect(a: Vec3, b: Vec3, rect: &[f32; 4]) -> bool {
    let d = b - a;
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
    for (origin, delta, lo, hi) in [(a.x, d.x, rect[0], rect[2]), (a.z, d.z, rect[1], rect[3])] {
        if delta.abs() < 1e-6 {
            if origin < lo || origin > hi {
                return false;
            }
            continue;
        }
        let (mut near, mut far) = ((lo - origin) / delta, (hi - origin) / delta);
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t0 = t0.max(near);
        t1 = t1.min(far);
        if t0 > t1 {
            return false;
        }
    }
    true
}
