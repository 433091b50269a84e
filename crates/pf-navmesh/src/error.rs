//! Navmesh error type.

use thiserror::Error;

use pf_core::{AreaId, PolyRef};

/// Errors produced while building or editing a [`NavMesh`](crate::NavMesh).
#[derive(Debug, Error)]
pub enum NavMeshError {
    #[error("rect {index} is degenerate or non-finite: x {x0}..{x1}, z {z0}..{z1}")]
    DegenerateRect { index: usize, x0: f32, z0: f32, x1: f32, z1: f32 },

    #[error("polygon {0} not found in mesh")]
    PolyNotFound(PolyRef),

    #[error("area {0} is outside the 32 maskable categories")]
    InvalidArea(AreaId),

    #[error("mesh has more polygons than PolyRef can address")]
    TooManyPolys,
}

pub type NavMeshResult<T> = Result<T, NavMeshError>;
