//! The path worker pool.
//!
//! Bundles everything a batch needs to run: a dedicated rayon pool (so path
//! work never competes with the host's own rayon usage), the guarded navmesh,
//! the query handle pool, and the per-query limits taken from the config.
//! Cloning is cheap and shares all of it.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use pf_core::{PathfindingConfig, Vec3};
use pf_navmesh::{NavMeshLock, PathQuery, QueryPool};

use crate::BatchResult;

/// Per-query limits, fixed for the lifetime of a worker pool.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JobParams {
    pub origin_extents:        Vec3,
    pub endpoint_extents:      Vec3,
    /// Squared distance the last corner may be from the true destination.
    pub endpoint_tolerance_sq: f32,
    /// Corridor-search iterations per read-lock yield.
    pub find_path_iterations:  u32,
    pub max_corners:           usize,
}

impl JobParams {
    pub fn from_config(config: &PathfindingConfig) -> Self {
        Self {
            origin_extents:        config.origin_extents(),
            endpoint_extents:      config.endpoint_extents(),
            endpoint_tolerance_sq: config.endpoint_tolerance_sq(),
            find_path_iterations:  config.find_path_iterations,
            max_corners:           config.max_corners,
        }
    }
}

pub struct PathWorkers<Q: PathQuery> {
    pub(crate) threads: Arc<ThreadPool>,
    pub(crate) navmesh: Arc<NavMeshLock<Q::Mesh>>,
    pub(crate) queries: Arc<QueryPool<Q>>,
    pub(crate) params:  JobParams,
}

impl<Q: PathQuery> PathWorkers<Q> {
    pub fn new(navmesh: Arc<NavMeshLock<Q::Mesh>>, config: &PathfindingConfig) -> BatchResult<Self> {
        config.validate()?;
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("pf-path-{i}"));
        if let Some(n) = config.worker_threads {
            builder = builder.num_threads(n);
        }
        let threads = builder.build()?;
        log::debug!(
            "path workers: {} threads, {} iterations per slice",
            threads.current_num_threads(),
            config.find_path_iterations
        );
        Ok(Self {
            threads: Arc::new(threads),
            navmesh,
            queries: Arc::new(QueryPool::new(config.max_path_nodes, config.query_pool_capacity)),
            params: JobParams::from_config(config),
        })
    }

    pub fn navmesh(&self) -> &Arc<NavMeshLock<Q::Mesh>> {
        &self.navmesh
    }

    pub fn queries(&self) -> &QueryPool<Q> {
        &self.queries
    }

    pub fn params(&self) -> &JobParams {
        &self.params
    }

    pub fn thread_count(&self) -> usize {
        self.threads.current_num_threads()
    }
}

impl<Q: PathQuery> Clone for PathWorkers<Q> {
    fn clone(&self) -> Self {
        Self {
            threads: Arc::clone(&self.threads),
            navmesh: Arc::clone(&self.navmesh),
            queries: Arc::clone(&self.queries),
            params:  self.params,
        }
    }
}
