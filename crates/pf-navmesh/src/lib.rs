//! `pf-navmesh`: the navmesh query primitive and the shared-resource plumbing
//! around it.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                      |
//! |------------|---------------------------------------------------------------|
//! | [`query`]  | `PathQuery` trait (pluggable primitive), `NavLocation`       |
//! | [`status`] | `QueryStatus` bit flags                                       |
//! | [`mesh`]   | `NavMesh` (rect polygons, CSR links, R-tree), `NavMeshBuilder` |
//! | [`astar`]  | `AStarQuery`: sliced A* corridor search + funnel             |
//! | [`lock`]   | `NavMeshLock`: readers/writer guard with reader yielding    |
//! | [`pool`]   | `QueryPool`, `PooledQuery`: reusable query handles          |
//! | [`error`]  | `NavMeshError`, `NavMeshResult<T>`                           |

pub mod astar;
pub mod error;
pub mod lock;
pub mod mesh;
pub mod pool;
pub mod query;
pub mod status;


pub use astar::AStarQuery;
pub use error::{NavMeshError, NavMeshResult};
pub use lock::{NavMeshLock, NavMeshReadGuard, NavMeshWriteGuard};
pub use mesh::{NavMesh, NavMeshBuilder};
pub use pool::{PooledQuery, QueryPool};
pub use query::{NavLocation, PathQuery};
pub use status::QueryStatus;
