//! Unit and end-to-end tests for node selection.

#[cfg(test)]
mod fixtures {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use pf_batch::PathWorkers;
    use pf_core::{AREA_WALKABLE, AgentId, CandidateList, PathfindingConfig, Vec3};
    use pf_navmesh::{AStarQuery, NavMesh, NavMeshBuilder, NavMeshLock};

    use crate::{AgentState, AsyncDistancePathfinding, DistancePathfindingStatus, LineOfSight, Retrieval};

    pub type Registry = AsyncDistancePathfinding<AStarQuery>;

    /// Unit tiles `[i, i+1] × [-1, 1]` for `i` in `0..len`, plus extra rects
    /// `(x0, x1)` over the same z range.
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

    pub fn workers(mesh: NavMesh, config: &PathfindingConfig) -> PathWorkers<AStarQuery> {
        let config = PathfindingConfig { worker_threads: Some(2), ..config.clone() };
        PathWorkers::new(Arc::new(NavMeshLock::new(mesh)), &config).unwrap()
    }

    pub fn registry(mesh: NavMesh, config: PathfindingConfig) -> Registry {
        AsyncDistancePathfinding::new(workers(mesh, &config), config)
    }

    pub fn agent_at(position: Vec3, candidates: &[Vec3]) -> AgentState {
        AgentState::new(position, CandidateList::from_positions(candidates.iter().copied()))
    }

    pub fn x(v: f32) -> Vec3 {
        Vec3::new(v, 0.0, 0.0)
    }

    pub fn blocked() -> impl LineOfSight {
        |_: Vec3, _: Vec3, _: u32| true
    }

    /// Update once per "frame" until a choice is published, then retrieve it.
    pub fn drive(reg: &mut Registry, id: AgentId, agent: &AgentState, los: &dyn LineOfSight) -> Retrieval {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !reg.status(id).is_some_and(DistancePathfindingStatus::has_choice) {
            assert!(Instant::now() < deadline, "selection never published");
            reg.update(id, agent, los);
            thread::sleep(Duration::from_millis(1));
        }
        reg.retrieve_chosen_node(id)
    }

    /// Update until every selection of `id` has drained.
    pub fn settle(reg: &mut Registry, id: AgentId, agent: &AgentState, los: &dyn LineOfSight) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while reg.status(id).is_some_and(DistancePathfindingStatus::is_busy) {
            assert!(Instant::now() < deadline, "selection never drained");
            reg.update(id, agent, los);
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod sorter {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use pf_core::{CandidateId, CandidateList, Vec3};

    use super::fixtures::x;
    use crate::SortedCandidates;

    fn check_sorted(s: &SortedCandidates, list: &CandidateList, target: Vec3, farthest_first: bool) {
        let d: Vec<f32> = s.positions().iter().map(|p| p.distance_squared(target)).collect();
        for w in d.windows(2) {
            if farthest_first {
                assert!(w[0] >= w[1], "{d:?}");
            } else {
                assert!(w[0] <= w[1], "{d:?}");
            }
        }
        let mut ids: Vec<u32> = s.ids().iter().map(|id| id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..list.len() as u32).collect::<Vec<_>>());
        for (id, p) in s.ids().iter().zip(s.positions()) {
            assert_eq!(list.as_slice()[id.index()].position, *p);
        }
    }

    #[test]
    fn random_lists_sort_monotonically() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            let n = rng.gen_range(0..40);
            let list = CandidateList::from_positions((0..n).map(|_| {
                Vec3::new(rng.gen_range(-50.0..50.0), rng.gen_range(-5.0..5.0), rng.gen_range(-50.0..50.0))
            }));
            let mut s = SortedCandidates::new();
            for _ in 0..5 {
                let target = Vec3::new(rng.gen_range(-60.0..60.0), 0.0, rng.gen_range(-60.0..60.0));
                let farthest_first = rng.gen_bool(0.5);
                s.sort_nodes(&list, target, farthest_first);
                check_sorted(&s, &list, target, farthest_first);
            }
        }
    }

    #[test]
    fn unchanged_order_costs_one_comparison_per_element() {
        let n = 64;
        let list = CandidateList::from_positions((0..n).map(|i| x(i as f32 * 10.0)));
        let mut s = SortedCandidates::new();
        s.sort_nodes(&list, x(-5.0), false);
        assert_eq!(s.sort_nodes(&list, x(-5.0), false), n - 1);
        assert_eq!(s.sort_nodes(&list, x(-1.0), false), n - 1);
    }

    #[test]
    fn small_target_move_stays_linear() {
        let n = 64;
        let list = CandidateList::from_positions((0..n).map(|i| x(i as f32 * 10.0)));
        let mut s = SortedCandidates::new();
        s.sort_nodes(&list, x(-5.0), false);
        // The first two swap; everything else stays.
        let comparisons = s.sort_nodes(&list, x(6.0), false);
        assert!(comparisons <= n, "{comparisons}");
        assert_eq!(&s.ids()[..3], &[CandidateId(1), CandidateId(0), CandidateId(2)]);
    }

    #[test]
    fn new_list_rebuilds() {
        let a = CandidateList::from_positions([x(1.0), x(2.0)]);
        let b = CandidateList::from_positions([x(7.0), x(3.0)]);
        let mut s = SortedCandidates::new();
        s.sort_nodes(&a, x(0.0), true);
        assert_eq!(s.positions(), &[x(2.0), x(1.0)]);
        s.sort_nodes(&b, x(0.0), true);
        assert_eq!(s.positions(), &[x(7.0), x(3.0)]);
        assert_eq!(s.ids(), &[CandidateId(0), CandidateId(1)]);
    }

    #[test]
    fn ties_keep_natural_order() {
        let list = CandidateList::from_positions([x(-2.0), x(2.0), x(1.0)]);
        let mut s = SortedCandidates::new();
        s.sort_nodes(&list, x(0.0), true);
        assert_eq!(s.ids(), &[CandidateId(0), CandidateId(1), CandidateId(2)]);
        assert_eq!(s.get(2).map(|c| c.position), Some(x(1.0)));
        assert_eq!(s.get(3), None);
    }
}

#[cfg(test)]
mod scan {
    use std::cell::Cell;

    use pf_batch::{FailureReason, SlotStatus};
    use pf_core::{FallbackPolicy, PolyRef, PurposeId, Vec3};
    use pf_navmesh::NavLocation;

    use super::fixtures::x;
    use crate::{
        ClearLineOfSight, PathResults, ScanOutcome, SelectionPolicy, SelectionRequest,
        fallback_candidate, path_obstructed, scan_candidates,
    };

    const FAILED: SlotStatus = SlotStatus::Failure(FailureReason::CorridorSearch);

    struct FakeResults {
        statuses: Vec<SlotStatus>,
        paths:    Vec<Vec<NavLocation>>,
    }

    impl FakeResults {
        /// Straight two-corner paths from the origin to each position.
        fn straight(positions: &[Vec3], statuses: Vec<SlotStatus>) -> Self {
            let paths = positions
                .iter()
                .map(|&p| vec![NavLocation::new(PolyRef(0), Vec3::ZERO), NavLocation::new(PolyRef(1), p)])
                .collect();
            Self { statuses, paths }
        }
    }

    impl PathResults for FakeResults {
        fn len(&self) -> usize {
            self.statuses.len()
        }

        fn status(&self, index: usize) -> SlotStatus {
            self.statuses[index]
        }

        fn with_corners<R>(&self, index: usize, f: impl FnOnce(&[NavLocation]) -> R) -> R {
            f(&self.paths[index])
        }
    }

    fn request(offset: u32, avoid_line_of_sight: bool, cap_distance: f32) -> SelectionRequest {
        SelectionRequest {
            purpose: PurposeId(1),
            target: Vec3::ZERO,
            farthest_first: true,
            avoid_line_of_sight,
            offset,
            cap_distance,
        }
    }

    fn corners(xs: &[f32]) -> Vec<NavLocation> {
        xs.iter().map(|&v| NavLocation::new(PolyRef(0), x(v))).collect()
    }

    #[test]
    fn stops_at_first_in_progress() {
        let pos = [x(3.0), x(2.0), x(1.0)];
        let r = FakeResults::straight(&pos, vec![FAILED, SlotStatus::InProgress, SlotStatus::Success]);
        let out = scan_candidates(&r, &pos, &request(0, false, 0.0), Vec3::ZERO, &ClearLineOfSight, &SelectionPolicy::default());
        assert_eq!(out, ScanOutcome::Incomplete);
    }

    #[test]
    fn failures_are_skipped() {
        let pos = [x(3.0), x(2.0)];
        let r = FakeResults::straight(&pos, vec![FAILED, SlotStatus::Success]);
        let out = scan_candidates(&r, &pos, &request(0, false, 0.0), Vec3::ZERO, &ClearLineOfSight, &SelectionPolicy::default());
        assert_eq!(out, ScanOutcome::Winner(1));
    }

    #[test]
    fn capped_candidates_never_block_the_scan() {
        let pos = [x(50.0), x(5.0)];
        let r = FakeResults::straight(&pos, vec![SlotStatus::InProgress, SlotStatus::Success]);
        let out = scan_candidates(&r, &pos, &request(0, false, 10.0), Vec3::ZERO, &ClearLineOfSight, &SelectionPolicy::default());
        assert_eq!(out, ScanOutcome::Winner(1));
    }

    #[test]
    fn capped_slot_in_progress_keeps_scan_incomplete() {
        let pos = [x(50.0), x(5.0)];
        let blocked = |_: Vec3, _: Vec3, _: u32| true;
        let policy = SelectionPolicy::default();
        let req = request(0, true, 10.0);

        // Nothing in range is accepted, but the capped slot is still running.
        let r = FakeResults::straight(&pos, vec![SlotStatus::InProgress, SlotStatus::Success]);
        assert_eq!(scan_candidates(&r, &pos, &req, Vec3::ZERO, &blocked, &policy), ScanOutcome::Incomplete);

        let r = FakeResults::straight(&pos, vec![SlotStatus::Success, SlotStatus::Success]);
        assert_eq!(scan_candidates(&r, &pos, &req, Vec3::ZERO, &blocked, &policy), ScanOutcome::Exhausted);
    }

    #[test]
    fn invalid_first_corner_is_skipped() {
        let pos = [x(3.0), x(2.0), x(1.0)];
        let mut r = FakeResults::straight(&pos, vec![SlotStatus::Success; 3]);
        r.paths[0][0] = NavLocation::NULL;
        r.paths[1].clear();
        let out = scan_candidates(&r, &pos, &request(0, false, 0.0), Vec3::ZERO, &ClearLineOfSight, &SelectionPolicy::default());
        assert_eq!(out, ScanOutcome::Winner(2));
    }

    #[test]
    fn offset_counts_accepted_candidates_only() {
        let pos = [x(4.0), x(3.0), x(2.0), x(1.0)];
        let r = FakeResults::straight(&pos, vec![SlotStatus::Success, FAILED, SlotStatus::Success, SlotStatus::Success]);
        let policy = SelectionPolicy::default();
        let scan = |offset| scan_candidates(&r, &pos, &request(offset, false, 0.0), Vec3::ZERO, &ClearLineOfSight, &policy);
        assert_eq!(scan(0), ScanOutcome::Winner(0));
        assert_eq!(scan(1), ScanOutcome::Winner(2));
        assert_eq!(scan(2), ScanOutcome::Winner(3));
        assert_eq!(scan(3), ScanOutcome::Exhausted);
    }

    #[test]
    fn obstructed_paths_rejected_only_when_avoiding() {
        let pos = [x(4.0), x(3.0)];
        let r = FakeResults::straight(&pos, vec![SlotStatus::Success; 2]);
        let los = |_: Vec3, end: Vec3, _: u32| end.x > 3.5;
        let policy = SelectionPolicy::default();
        assert_eq!(scan_candidates(&r, &pos, &request(0, true, 0.0), Vec3::ZERO, &los, &policy), ScanOutcome::Winner(1));
        assert_eq!(scan_candidates(&r, &pos, &request(0, false, 0.0), Vec3::ZERO, &los, &policy), ScanOutcome::Winner(0));
    }

    #[test]
    fn acceptance_is_recounted_every_frame() {
        let pos = [x(3.0), x(2.0), x(1.0)];
        let policy = SelectionPolicy::default();
        let req = request(1, true, 0.0);

        // Frame 1: candidate 0 is in view, candidate 2 still running.
        let r = FakeResults::straight(&pos, vec![SlotStatus::Success, SlotStatus::Success, SlotStatus::InProgress]);
        let in_view = |_: Vec3, end: Vec3, _: u32| end.x > 2.5;
        assert_eq!(scan_candidates(&r, &pos, &req, Vec3::ZERO, &in_view, &policy), ScanOutcome::Incomplete);

        // Frame 2: the sight line cleared and candidate 2 finished.  Candidate
        // 0 now counts toward the offset, so candidate 1 wins.
        let r = FakeResults::straight(&pos, vec![SlotStatus::Success; 3]);
        assert_eq!(scan_candidates(&r, &pos, &req, Vec3::ZERO, &ClearLineOfSight, &policy), ScanOutcome::Winner(1));
    }

    #[test]
    fn linecasts_capped_at_segment_limit() {
        let path = corners(&(0..30).map(|i| i as f32).collect::<Vec<_>>());
        let calls = Cell::new(0);
        let los = |_: Vec3, _: Vec3, mask: u32| {
            assert_eq!(mask, 0x40000);
            calls.set(calls.get() + 1);
            false
        };
        assert!(!path_obstructed(&path, Vec3::ZERO, 0.0, &los, 0x40000, 16));
        assert_eq!(calls.get(), 15);
    }

    #[test]
    fn linecasts_stop_beyond_cap() {
        let path = corners(&[0.0, 5.0, 10.0, 15.0, 20.0]);
        let calls = Cell::new(0);
        let los = |_: Vec3, _: Vec3, _: u32| {
            calls.set(calls.get() + 1);
            false
        };
        assert!(!path_obstructed(&path, Vec3::ZERO, 12.0 * 12.0, &los, 0x40000, 16));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn single_corner_path_never_obstructed() {
        let blocked = |_: Vec3, _: Vec3, _: u32| true;
        assert!(!path_obstructed(&corners(&[1.0]), Vec3::ZERO, 0.0, &blocked, 0x40000, 16));
        assert!(path_obstructed(&corners(&[0.0, 1.0]), Vec3::ZERO, 0.0, &blocked, 0x40000, 16));
    }

    #[test]
    fn fallback_policies() {
        let pos = [x(3.0), x(2.0), x(1.0)];
        let r = FakeResults::straight(&pos, vec![FAILED, SlotStatus::Success, SlotStatus::Success]);
        assert_eq!(fallback_candidate(&r, FallbackPolicy::BestPathable), Some(1));
        assert_eq!(fallback_candidate(&r, FallbackPolicy::Vanilla), Some(0));
        assert_eq!(fallback_candidate(&r, FallbackPolicy::DontMove), None);

        let none = FakeResults::straight(&pos, vec![FAILED; 3]);
        assert_eq!(fallback_candidate(&none, FallbackPolicy::BestPathable), None);
        let empty = FakeResults::straight(&[], Vec::new());
        assert_eq!(fallback_candidate(&empty, FallbackPolicy::Vanilla), None);
    }
}

#[cfg(test)]
mod selection {
    use pf_core::{AgentId, CandidateId, FallbackPolicy, PathfindingConfig, Preset, PurposeId, Vec3};

    use super::fixtures::{agent_at, blocked, drive, registry, settle, strip, x};
    use crate::{ChosenNode, ClearLineOfSight, Retrieval};

    const AGENT: AgentId = AgentId(0);
    const PURPOSE: PurposeId = PurposeId(3);

    fn three() -> [Vec3; 3] {
        [x(10.0), x(20.0), x(5.0)]
    }

    fn candidate(node: Option<ChosenNode>) -> (CandidateId, Vec3) {
        let c = node.and_then(|n| n.candidate()).expect("a candidate was chosen");
        (c.id, c.position)
    }

    fn with_fallback(fallback: FallbackPolicy) -> PathfindingConfig {
        PathfindingConfig { fallback_node_selection: Some(fallback), ..Default::default() }
    }

    #[test]
    fn farthest_reachable_node_wins() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        assert!(reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None));
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(candidate(got.node), (CandidateId(1), x(20.0)));
        assert!((got.distance - 20.0).abs() < 1e-4);
    }

    #[test]
    fn unreachable_node_is_passed_over() {
        let mut reg = registry(strip(15, &[(19.0, 21.0)]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(candidate(got.node), (CandidateId(0), x(10.0)));
        assert!((got.distance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn closest_node_to_target() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(x(12.0), &three());
        reg.start_choosing_closest_node_to_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(candidate(got.node), (CandidateId(2), x(5.0)));
    }

    #[test]
    fn all_obstructed_falls_back_to_best_pathable() {
        let mut reg = registry(strip(22, &[]), with_fallback(FallbackPolicy::BestPathable));
        let agent = agent_at(Vec3::ZERO, &three());
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, true, 0, None);
        let got = drive(&mut reg, AGENT, &agent, &blocked());
        assert_eq!(candidate(got.node), (CandidateId(1), x(20.0)));
    }

    #[test]
    fn every_fallback_publishes_something() {
        let expected = [
            (FallbackPolicy::BestPathable, ChosenNode::Candidate(pf_core::Candidate { id: CandidateId(0), position: x(10.0) }), 10.0),
            (FallbackPolicy::Vanilla, ChosenNode::Candidate(pf_core::Candidate { id: CandidateId(1), position: x(20.0) }), 20.0),
            (FallbackPolicy::DontMove, ChosenNode::SelfPosition(x(0.5)), 0.0),
        ];
        for (fallback, node, distance) in expected {
            let mut reg = registry(strip(15, &[(19.0, 21.0)]), with_fallback(fallback));
            let agent = agent_at(x(0.5), &three());
            reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, true, 0, None);
            let got = drive(&mut reg, AGENT, &agent, &blocked());
            assert_eq!(got.node, Some(node), "{fallback:?}");
            assert!((got.distance - distance).abs() < 1e-4, "{fallback:?}: {}", got.distance);
            settle(&mut reg, AGENT, &agent, &blocked());
        }
    }

    #[test]
    fn offset_skips_accepted_candidates() {
        let mut reg = registry(strip(12, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &[x(2.0), x(4.0), x(6.0), x(8.0), x(10.0)]);

        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 2, None);
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(got.node.map(|n| n.position()), Some(x(6.0)));

        // The farthest node is in view, so it does not count toward the offset.
        let in_view = |_: Vec3, end: Vec3, _: u32| end.x > 9.0;
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, true, 1, None);
        let got = drive(&mut reg, AGENT, &agent, &in_view);
        assert_eq!(got.node.map(|n| n.position()), Some(x(6.0)));
    }

    #[test]
    fn offset_past_accepted_count_falls_back() {
        let mut reg = registry(strip(12, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &[x(2.0), x(4.0)]);
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 5, None);
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(got.node.map(|n| n.position()), Some(x(4.0)));
    }

    #[test]
    fn cap_distance_excludes_far_nodes() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, Some(12.0));
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(candidate(got.node), (CandidateId(0), x(10.0)));
    }

    #[test]
    fn no_candidates_publishes_own_position_at_once() {
        let mut reg = registry(strip(4, &[]), PathfindingConfig::default());
        let agent = agent_at(x(1.5), &[]);
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        assert!(!reg.status(AGENT).unwrap().is_busy());
        let got = reg.retrieve_chosen_node(AGENT);
        assert_eq!(got, Retrieval { node: Some(ChosenNode::SelfPosition(x(1.5))), distance: 0.0 });
    }

    #[test]
    fn off_mesh_agent_publishes_own_position_at_once() {
        let mut reg = registry(strip(4, &[]), PathfindingConfig::default());
        let mut agent = agent_at(x(1.5), &[x(3.0)]);
        agent.on_navmesh = false;
        reg.start_choosing_closest_node_to_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        let got = reg.retrieve_chosen_node(AGENT);
        assert_eq!(got.node, Some(ChosenNode::SelfPosition(x(1.5))));
    }

    #[test]
    fn repeat_purpose_is_a_no_op() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        assert!(reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None));
        assert!(!reg.start_choosing_closest_node_to_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None));
        assert_eq!(reg.status(AGENT).unwrap().retiring_count(), 0);
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(got.node.map(|n| n.position()), Some(x(20.0)));
    }

    #[test]
    fn new_purpose_supersedes_running_selection() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        assert!(reg.start_choosing_closest_node_to_position(AGENT, &agent, PurposeId(4), Vec3::ZERO, false, 0, None));

        let status = reg.status(AGENT).unwrap();
        assert_eq!(status.purpose(), Some(PurposeId(4)));
        assert_eq!(status.retiring_count(), 1);

        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(got.node.map(|n| n.position()), Some(x(5.0)));
        settle(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(reg.status(AGENT).unwrap().retiring_count(), 0);
    }

    #[test]
    fn superseded_jobs_are_pooled_up_to_a_limit() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        for purpose in 10..16 {
            reg.start_choosing_farthest_node_from_position(AGENT, &agent, PurposeId(purpose), Vec3::ZERO, false, 0, None);
        }
        assert_eq!(reg.status(AGENT).unwrap().retiring_count(), 5);

        settle(&mut reg, AGENT, &agent, &ClearLineOfSight);
        let status = reg.status(AGENT).unwrap();
        assert_eq!(status.retiring_count(), 0);
        assert_eq!(status.spare_job_count(), 2);
    }

    #[test]
    fn new_purpose_discards_unretrieved_choice() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        settle(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert!(reg.status(AGENT).unwrap().has_choice());

        reg.start_choosing_closest_node_to_position(AGENT, &agent, PurposeId(4), Vec3::ZERO, false, 0, None);
        assert!(!reg.status(AGENT).unwrap().has_choice());
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(got.node.map(|n| n.position()), Some(x(5.0)));
    }

    #[test]
    fn retrieval_is_consumed_once() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        assert_eq!(reg.retrieve_chosen_node(AGENT), Retrieval::NONE);

        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        assert!(drive(&mut reg, AGENT, &agent, &ClearLineOfSight).node.is_some());
        assert_eq!(reg.retrieve_chosen_node(AGENT), Retrieval::NONE);
        assert_eq!(reg.status(AGENT).unwrap().purpose(), None);

        // Same purpose starts afresh once retrieved.
        assert!(reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None));
        assert!(drive(&mut reg, AGENT, &agent, &ClearLineOfSight).node.is_some());
    }

    #[test]
    fn legacy_preset_leaves_distance_unset() {
        let config = PathfindingConfig { preset: Preset::Vanilla, ..Default::default() };
        let mut reg = registry(strip(22, &[]), config);
        let agent = agent_at(Vec3::ZERO, &three());
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        let got = drive(&mut reg, AGENT, &agent, &ClearLineOfSight);
        assert_eq!(got.node.map(|n| n.position()), Some(x(20.0)));
        assert_eq!(got.distance, f32::INFINITY);
    }

    #[test]
    fn removed_status_stops_cleanly() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let agent = agent_at(Vec3::ZERO, &three());
        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        reg.remove_status(AGENT);
        let status = reg.status(AGENT).unwrap();
        assert!(!status.is_busy());
        assert_eq!(status.purpose(), None);

        reg.start_choosing_farthest_node_from_position(AGENT, &agent, PURPOSE, Vec3::ZERO, false, 0, None);
        assert!(drive(&mut reg, AGENT, &agent, &ClearLineOfSight).node.is_some());
    }

    #[test]
    fn update_all_drives_and_prunes() {
        let mut reg = registry(strip(22, &[]), PathfindingConfig::default());
        let mut agents = vec![Some(agent_at(Vec3::ZERO, &three())), Some(agent_at(x(1.0), &three()))];
        for (i, agent) in agents.iter().enumerate() {
            let agent = agent.as_ref().unwrap();
            reg.start_choosing_farthest_node_from_position(AgentId(i as u32), agent, PURPOSE, Vec3::ZERO, false, 0, None);
        }
        agents[1] = None;

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while !reg.status(AgentId(0)).unwrap().has_choice() {
            assert!(std::time::Instant::now() < deadline);
            reg.update_all(&agents, &ClearLineOfSight);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(reg.status(AgentId(1)).unwrap().purpose(), None);
        assert_eq!(reg.retrieve_chosen_node(AgentId(0)).node.map(|n| n.position()), Some(x(20.0)));
    }
}

#[cfg(test)]
mod targets {
    use std::time::Duration;

    use pf_batch::SlotStatus;
    use pf_core::{AgentId, PathfindingConfig, Vec3};

    use super::fixtures::{agent_at, strip, workers, x};
    use crate::{AsyncTargetPathfinding, TargetPathfindingStatus};

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn skipped_targets_have_no_slot() {
        let w = workers(strip(15, &[(19.0, 21.0)]), &PathfindingConfig::default());
        let agent = agent_at(x(0.5), &[]);
        let mut status = TargetPathfindingStatus::new();
        assert!(status.start_jobs(&agent, &[Some(x(9.5)), None, Some(x(20.0))], &w));
        assert!(status.handle().unwrap().wait_timeout(WAIT));

        assert_eq!(status.slot_for_target(0), Some(0));
        assert_eq!(status.slot_for_target(1), None);
        assert_eq!(status.slot_for_target(2), Some(1));
        assert_eq!(status.path_status(0), Some(SlotStatus::Success));
        assert_eq!(status.path_status(1), None);
        assert!(status.path_status(2).is_some_and(SlotStatus::is_failure));
        assert!((status.path_length(0).unwrap() - 9.0).abs() < 1e-4);
        assert_eq!(status.path_length(2), None);
    }

    #[test]
    fn paths_start_from_link_exit() {
        let w = workers(strip(12, &[]), &PathfindingConfig::default());
        let mut agent = agent_at(x(0.5), &[]);
        agent.link_exit = Some(x(5.5));
        let mut status = TargetPathfindingStatus::new();
        status.start_jobs(&agent, &[Some(x(9.5))], &w);
        assert!(status.handle().unwrap().wait_timeout(WAIT));
        assert!((status.path_length(0).unwrap() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn restart_requires_reset() {
        let mut reg = AsyncTargetPathfinding::new(workers(strip(12, &[]), &PathfindingConfig::default()));
        let agent = agent_at(x(0.5), &[]);
        let id = AgentId(2);
        assert!(reg.reset_if_jobs_have_completed(id));
        assert!(reg.start_jobs(id, &agent, &[Some(x(3.5))]));
        assert!(!reg.start_jobs(id, &agent, &[Some(x(3.5))]));

        assert!(reg.status(id).unwrap().handle().unwrap().wait_timeout(WAIT));
        assert!(reg.reset_if_jobs_have_completed(id));
        assert!(!reg.status(id).unwrap().has_started());
        assert!(reg.start_jobs(id, &agent, &[Some(x(7.5)), Some(Vec3::new(2.5, 0.0, 0.5))]));
        assert!(reg.status(id).unwrap().handle().unwrap().wait_timeout(WAIT));
        assert_eq!(reg.status(id).unwrap().path_status(1), Some(SlotStatus::Success));

        reg.remove_status(id);
        assert!(!reg.status(id).unwrap().has_started());
    }
}

#[cfg(test)]
mod roaming {
    use std::time::Duration;

    use pf_batch::{FailureReason, SlotStatus};
    use pf_core::{AgentId, PathfindingConfig, Vec3};

    use super::fixtures::{agent_at, strip, workers, x};
    use crate::{AsyncRoamingPathfinding, RoamingPathfindingStatus, RoamingStart};

    const WAIT: Duration = Duration::from_secs(10);

    fn nodes() -> [Vec3; 4] {
        [x(2.5), x(6.5), x(9.5), x(20.0)]
    }

    fn wait(status: &RoamingPathfindingStatus) {
        let (from_agent, from_start) = status.handles();
        for handle in from_agent.into_iter().chain(from_start) {
            assert!(handle.wait_timeout(WAIT));
        }
    }

    #[test]
    fn nodes_are_stored_in_reverse() {
        let w = workers(strip(12, &[(19.0, 21.0)]), &PathfindingConfig::default());
        let mut status = RoamingPathfindingStatus::new();
        let start = status.stop_previous_jobs_and_start_new_ones(&agent_at(x(0.5), &[]), &nodes(), None, &w);
        assert_eq!(start, RoamingStart::Started);
        assert_eq!(status.node_count(), 4);
        assert_eq!(status.job_index(0), Some(3));
        assert_eq!(status.job_index(3), Some(0));
        assert_eq!(status.job_index(4), None);
        assert_eq!(status.node_position(0), Some(x(2.5)));
        assert_eq!(status.node_position(3), Some(x(20.0)));
        wait(&status);
    }

    #[test]
    fn distances_from_agent_when_search_started_here() {
        let w = workers(strip(12, &[(19.0, 21.0)]), &PathfindingConfig::default());
        let mut status = RoamingPathfindingStatus::new();
        status.stop_previous_jobs_and_start_new_ones(&agent_at(x(0.5), &[]), &nodes(), None, &w);
        wait(&status);

        assert!(status.started_at_self());
        assert!(status.handles().1.is_none());
        for (node, expected) in [2.0, 6.0, 9.0].into_iter().enumerate() {
            assert_eq!(status.path_status(node), SlotStatus::Success, "node {node}");
            assert!((status.path_distance(node) - expected).abs() < 1e-4, "node {node}");
        }
        assert!(status.path_status(3).is_failure());
        assert_eq!(status.path_distance(3), 0.0);
        assert_eq!(status.path_status(9), SlotStatus::Failure(FailureReason::Canceled));
    }

    #[test]
    fn distances_from_search_start_otherwise() {
        let w = workers(strip(12, &[(19.0, 21.0)]), &PathfindingConfig::default());
        let mut status = RoamingPathfindingStatus::new();
        status.stop_previous_jobs_and_start_new_ones(&agent_at(x(0.5), &[]), &nodes(), Some(x(5.5)), &w);
        wait(&status);

        assert!(!status.started_at_self());
        for (node, expected) in [3.0, 1.0, 4.0].into_iter().enumerate() {
            assert_eq!(status.path_status(node), SlotStatus::Success, "node {node}");
            assert!((status.path_distance(node) - expected).abs() < 1e-4, "node {node}");
        }
        assert!(status.path_status(3).is_failure());
    }

    #[test]
    fn running_batch_is_canceled_before_restart() {
        let w = workers(strip(12, &[]), &PathfindingConfig::default());
        let agent = agent_at(x(0.5), &[]);
        let mut status = RoamingPathfindingStatus::new();
        {
            // Hold the mesh so the first batch cannot finish.
            let _write = w.navmesh().write();
            assert_eq!(
                status.stop_previous_jobs_and_start_new_ones(&agent, &nodes()[..3], Some(x(5.5)), &w),
                RoamingStart::Started
            );
            assert!(!status.is_idle());
            assert_eq!(
                status.stop_previous_jobs_and_start_new_ones(&agent, &nodes()[..3], None, &w),
                RoamingStart::Deferred
            );
        }
        wait(&status);
        assert!(status.is_idle());
        for node in 0..3 {
            assert!(!status.path_status(node).is_in_progress(), "node {node}");
        }

        assert_eq!(
            status.stop_previous_jobs_and_start_new_ones(&agent, &nodes()[..3], None, &w),
            RoamingStart::Started
        );
        wait(&status);
        assert_eq!(status.path_status(2), SlotStatus::Success);
        assert!((status.path_distance(2) - 9.0).abs() < 1e-4);
    }

    #[test]
    fn registry_reads_and_removes() {
        let mut reg = AsyncRoamingPathfinding::new(workers(strip(12, &[]), &PathfindingConfig::default()));
        let agent = agent_at(x(0.5), &[]);
        let id = AgentId(1);
        assert_eq!(reg.path_status(id, 0), SlotStatus::Failure(FailureReason::Canceled));
        assert_eq!(reg.path_distance(id, 0), 0.0);

        assert_eq!(reg.stop_previous_jobs_and_start_new_ones(id, &agent, &[x(4.5)], None), RoamingStart::Started);
        wait(reg.status(id).unwrap());
        assert_eq!(reg.path_status(id, 0), SlotStatus::Success);
        assert!((reg.path_distance(id, 0) - 4.0).abs() < 1e-4);

        reg.cancel_jobs(id);
        reg.remove_status(id);
        let status = reg.status(id).unwrap();
        assert_eq!(status.node_count(), 0);
        assert!(status.is_idle());
        assert_eq!(reg.path_status(id, 0), SlotStatus::Failure(FailureReason::Canceled));
    }
}
