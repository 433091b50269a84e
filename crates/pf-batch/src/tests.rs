//! Unit tests for batch path jobs on the reference navmesh.

#[cfg(test)]
mod fixtures {
    use std::sync::Arc;

    use pf_core::{AREA_WALKABLE, PathfindingConfig};
    use pf_navmesh::{AStarQuery, NavMesh, NavMeshBuilder, NavMeshLock};

    use crate::PathWorkers;

    /// Unit tiles `[i, i+1] × [-1, 1]` for `i` in `0..len`, plus any extra
    /// rects `(x0, x1)` spanning the same z range.
    pub fn strip(len: usize, extra: &[(f32, f32)]) -> NavMesh {
        let mut b = NavMeshBuilder::new();
        for i in 0..len {
            b.add_rect(i as f32, -1.0, i as f32 + 1.0, 1.0, 0.0, AREA_WALKABLE);
        }
        for &(x0, x1) in extra {
            b.add_rect(x0, -1.0, x1, 1.0, 0.0, AREA_WALKABLE);
        }
        b.build().unwrap()
    }

    pub fn workers(mesh: NavMesh, threads: usize) -> PathWorkers<AStarQuery> {
        let config = PathfindingConfig { worker_threads: Some(threads), ..Default::default() };
        PathWorkers::new(Arc::new(NavMeshLock::new(mesh)), &config).unwrap()
    }
}

#[cfg(test)]
mod status {
    use crate::{FailureReason, SlotStatus};

    #[test]
    fn classification() {
        assert!(SlotStatus::InProgress.is_in_progress());
        assert!(SlotStatus::Success.is_success());
        let f = SlotStatus::Failure(FailureReason::CorridorSearch);
        assert!(f.is_failure() && !f.is_success() && !f.is_in_progress());
    }
}

#[cfg(test)]
mod job {
    use std::time::Duration;

    use pf_core::{AgentProfile, Vec3};
    use pf_navmesh::QueryStatus;

    use super::fixtures::{strip, workers};
    use crate::{FailureReason, FindPathsJob, SlotStatus};

    const WAIT: Duration = Duration::from_secs(10);

    fn origin() -> Vec3 {
        Vec3::new(0.5, 0.0, 0.0)
    }

    #[test]
    fn all_reachable_destinations_succeed() {
        let w = workers(strip(10, &[]), 2);
        let dests = [Vec3::new(3.5, 0.0, 0.0), Vec3::new(7.5, 0.0, 0.5), Vec3::new(9.5, 0.0, 0.0)];
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), dests, true);
        assert_eq!(job.len(), 3);
        let handle = job.schedule(&w);
        assert!(handle.wait_timeout(WAIT));

        for (i, d) in dests.iter().enumerate() {
            assert_eq!(job.status(i), SlotStatus::Success, "slot {i}");
            let path = job.path(i).unwrap();
            assert_eq!(path[0].position, origin());
            assert!(path.last().unwrap().position.distance(*d) < 1e-4);
            drop(path);
            assert!((job.path_length(i) - origin().distance(*d)).abs() < 1e-4);
        }
        assert!(job.is_completed());
        assert!(job.query_detail(0).is_success());
    }

    #[test]
    fn length_is_zero_without_distance_calculation() {
        let w = workers(strip(6, &[]), 1);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(5.5, 0.0, 0.0)], false);
        assert!(job.schedule(&w).wait_timeout(WAIT));
        assert_eq!(job.status(0), SlotStatus::Success);
        assert_eq!(job.path_length(0), 0.0);
    }

    #[test]
    fn nearby_island_fails_endpoint_tolerance() {
        // Gap of 0.5 between the strip end and the island: the corridor
        // search gets as close as x = 10, two units short of the node.
        let w = workers(strip(10, &[(10.5, 12.5)]), 2);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(12.0, 0.0, 0.0)], true);
        assert!(job.schedule(&w).wait_timeout(WAIT));
        assert_eq!(job.status(0), SlotStatus::Failure(FailureReason::EndpointOutOfTolerance));
        assert!(job.query_detail(0).contains(QueryStatus::PARTIAL_RESULT));
        assert!(job.path(0).unwrap().is_empty());
        assert_eq!(job.path_length(0), 0.0);
    }

    #[test]
    fn mapping_failures_are_distinguished() {
        let w = workers(strip(10, &[]), 2);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(50.0, 0.0, 0.0)], false);
        assert!(job.schedule(&w).wait_timeout(WAIT));
        assert_eq!(job.status(0), SlotStatus::Failure(FailureReason::DestinationUnmapped));

        job.initialize(AgentProfile::default(), Vec3::new(-40.0, 0.0, 0.0), [Vec3::new(5.5, 0.0, 0.0)], false);
        assert!(job.schedule(&w).wait_timeout(WAIT));
        assert_eq!(job.status(0), SlotStatus::Failure(FailureReason::OriginUnmapped));
    }

    #[test]
    fn repeated_batches_are_deterministic() {
        let w = workers(strip(15, &[(19.0, 21.0)]), 3);
        let dests: Vec<Vec3> = (0..12).map(|i| Vec3::new(1.5 + i as f32 * 1.7, 0.0, 0.3)).collect();
        let mut job = FindPathsJob::new();
        let mut run = || {
            job.initialize(AgentProfile::default(), origin(), dests.iter().copied(), true);
            assert!(job.schedule(&w).wait_timeout(WAIT));
            (0..job.len())
                .map(|i| {
                    let corners = job.path(i).map(|p| p.to_vec()).unwrap_or_default();
                    (job.status(i), corners, job.path_length(i))
                })
                .collect::<Vec<_>>()
        };
        let first = run();
        assert!(first.iter().any(|(s, _, _)| s.is_success()));
        assert!(first.iter().any(|(s, _, _)| s.is_failure()));
        for _ in 0..3 {
            assert_eq!(run(), first);
        }
    }

    #[test]
    fn cancel_before_start_fails_every_slot() {
        let w = workers(strip(10, &[]), 2);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), (0..8).map(|i| Vec3::new(i as f32 + 1.5, 0.0, 0.0)), false);
        job.cancel();
        job.cancel();
        assert!(job.schedule(&w).wait_timeout(WAIT));
        for i in 0..8 {
            assert_eq!(job.status(i), SlotStatus::Failure(FailureReason::Canceled));
        }
    }

    #[test]
    fn cancel_mid_flight_resolves_every_slot() {
        let w = workers(strip(60, &[]), 2);
        let mut job = FindPathsJob::new();
        job.initialize(
            AgentProfile::default(),
            origin(),
            (0..40).map(|i| Vec3::new(59.5 - i as f32 * 0.5, 0.0, 0.0)),
            false,
        );
        // Hold the mesh so workers queue up behind the writer.
        let handle = {
            let _write = w.navmesh().write();
            let handle = job.schedule(&w);
            job.cancel();
            handle
        };
        assert!(handle.wait_timeout(WAIT));
        assert!(job.is_canceled());
        for i in 0..job.len() {
            assert!(!job.status(i).is_in_progress(), "slot {i} left in progress");
        }
    }

    #[test]
    fn path_is_withheld_until_slot_resolves() {
        let w = workers(strip(6, &[]), 1);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(4.5, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)], false);
        assert!(job.path(0).is_none());
        assert!(job.path(2).is_none());

        assert!(job.schedule(&w).wait_timeout(WAIT));
        assert!(job.path(0).is_some_and(|p| p.len() >= 2));
        assert!(job.path(1).is_some_and(|p| p.is_empty()));
        assert!(job.path(2).is_none());
    }

    #[test]
    fn initialize_resets_cancel_flag() {
        let w = workers(strip(4, &[]), 1);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(2.5, 0.0, 0.0)], false);
        job.cancel();
        assert!(job.schedule(&w).wait_timeout(WAIT));
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(2.5, 0.0, 0.0)], false);
        assert!(!job.is_canceled());
        assert!(job.status(0).is_in_progress());
        assert!(job.schedule(&w).wait_timeout(WAIT));
        assert_eq!(job.status(0), SlotStatus::Success);
    }

    #[test]
    fn buffers_grow_but_never_shrink() {
        let w = workers(strip(10, &[]), 1);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), (0..6).map(|i| Vec3::new(i as f32 + 0.5, 0.0, 0.0)), false);
        assert!(job.schedule(&w).wait_timeout(WAIT));
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(1.5, 0.0, 0.0)], false);
        assert_eq!(job.capacity(), 6);
        assert_eq!(job.len(), 1);
        assert_eq!(job.destination(0), Some(Vec3::new(1.5, 0.0, 0.0)));
        assert_eq!(job.destination(1), None);
        assert!(job.release());
        assert_eq!(job.capacity(), 0);
    }

    #[test]
    fn reinitialising_a_running_job_detaches_it() {
        let w = workers(strip(10, &[]), 1);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), (0..4).map(|i| Vec3::new(i as f32 + 5.5, 0.0, 0.0)), false);
        let write = w.navmesh().write();
        let old = job.schedule(&w);
        // Give the pool a moment to pick the batch up.
        std::thread::sleep(Duration::from_millis(20));
        job.initialize(AgentProfile::default(), origin(), [Vec3::new(2.5, 0.0, 0.0)], false);
        assert_eq!(job.capacity(), 1);
        drop(write);
        assert!(old.wait_timeout(WAIT));
        assert_eq!(job.len(), 1);
        assert!(job.schedule(&w).wait_timeout(WAIT));
        assert_eq!(job.status(0), SlotStatus::Success);
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let w = workers(strip(2, &[]), 1);
        let mut job = FindPathsJob::new();
        job.initialize(AgentProfile::default(), origin(), std::iter::empty::<Vec3>(), false);
        assert!(job.schedule(&w).is_completed());
        assert!(job.is_completed());
    }

    #[test]
    fn out_of_range_slot_reads_as_failed() {
        let job = FindPathsJob::new();
        assert!(job.status(3).is_failure());
        assert_eq!(job.path_length(3), 0.0);
    }

    #[test]
    fn query_handles_are_pooled_across_batches() {
        let w = workers(strip(10, &[]), 2);
        let mut job = FindPathsJob::new();
        for _ in 0..5 {
            job.initialize(AgentProfile::default(), origin(), (0..16).map(|i| Vec3::new(i as f32 * 0.6, 0.0, 0.0)), false);
            assert!(job.schedule(&w).wait_timeout(WAIT));
        }
        // At most one handle per work split in flight at a time.
        assert!(w.queries().created() >= 1);
        assert!(w.queries().created() <= 16, "created {}", w.queries().created());
        assert_eq!(w.queries().free_count(), w.queries().created());
    }
}

#[cfg(test)]
mod workers {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use pf_core::{AgentProfile, PathfindingConfig, PolyRef, Vec3};
    use pf_navmesh::{AStarQuery, NavMeshLock};

    use super::fixtures::{strip, workers};
    use crate::{BatchError, FindPathsJob, PathWorkers};

    #[test]
    fn rejects_invalid_config() {
        let config = PathfindingConfig { find_path_iterations: 0, ..Default::default() };
        let lock = Arc::new(NavMeshLock::new(strip(2, &[])));
        let err = PathWorkers::<AStarQuery>::new(lock, &config).err();
        assert!(matches!(err, Some(BatchError::Config(_))));
    }

    #[test]
    fn honours_thread_count_and_params() {
        let w = workers(strip(2, &[]), 3);
        assert_eq!(w.thread_count(), 3);
        assert_eq!(w.params().max_corners, 128);
        assert!((w.params().endpoint_tolerance_sq - 2.25).abs() < 1e-6);
        let clone = w.clone();
        assert!(Arc::ptr_eq(clone.navmesh(), w.navmesh()));
    }

    /// The main thread edits the mesh while batches run.  Every batch must
    /// still complete with every slot resolved.
    #[test]
    fn batches_complete_under_concurrent_writes() {
        let w = workers(strip(40, &[]), 2);
        let writer = {
            let lock = Arc::clone(w.navmesh());
            thread::spawn(move || {
                for n in 0..50u32 {
                    let mut mesh = lock.write();
                    let area = if n % 2 == 0 { 3 } else { 0 };
                    mesh.set_area(PolyRef(20), area).unwrap();
                    drop(mesh);
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };

        let mut job = FindPathsJob::new();
        for _ in 0..10 {
            job.initialize(
                AgentProfile::default(),
                Vec3::new(0.5, 0.0, 0.0),
                (0..20).map(|i| Vec3::new(39.5 - i as f32, 0.0, 0.0)),
                true,
            );
            assert!(job.schedule(&w).wait_timeout(Duration::from_secs(10)));
            assert!(job.is_completed());
        }
        writer.join().unwrap();
        assert!(w.navmesh().write_count() >= 50);
    }
}
