//! Geometry helpers on top of `glam`.
//!
//! Positions are world-space `Vec3` with `y` up.  The navmesh is a 2.5-D
//! surface, so most planar work happens in the x/z plane.

pub use glam::Vec3;

/// Sum of consecutive point-to-point Euclidean distances.
///
/// Returns `0.0` for fewer than two points.
pub fn polyline_length<I>(points: I) -> f32
where
    I: IntoIterator<Item = Vec3>,
{
    let mut iter = points.into_iter();
    let Some(mut prev) = iter.next() else {
        return 0.0;
    };
    let mut total = 0.0;
    for p in iter {
        total += prev.distance(p);
        prev = p;
    }
    total
}
