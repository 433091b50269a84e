//! Batch path query job.
//!
//! # Slot layout
//!
//! One slot per destination.  Each slot has an atomic status word (written
//! last, with release ordering, so a reader that sees a final status also sees
//! the path), a detail word carrying the raw [`QueryStatus`], and a corner
//! buffer that only the slot's own worker ever writes.
//!
//! # Buffer reuse
//!
//! Destination and slot buffers grow to the largest batch seen and are reused
//! after that.  Corner buffers keep their capacity too, so a steady-state
//! agent allocates nothing per batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use rayon::prelude::*;

use pf_core::{AgentProfile, CapacityBuffer, Vec3, polyline_length};
use pf_navmesh::{NavLocation, NavMeshLock, NavMeshReadGuard, PathQuery, QueryStatus};

use crate::{JobHandle, JobParams, PathWorkers};

// ── Slot status ───────────────────────────────────────────────────────────────

/// Why a slot failed.  Kept for diagnostics; selection only cares that it
/// failed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FailureReason {
    Canceled,
    OriginUnmapped,
    DestinationUnmapped,
    CorridorSearch,
    StraightPath,
    /// The path ends near the destination but not within tolerance of it.
    EndpointOutOfTolerance,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SlotStatus {
    InProgress,
    Success,
    Failure(FailureReason),
}

impl SlotStatus {
    #[inline]
    pub fn is_in_progress(self) -> bool {
        self == SlotStatus::InProgress
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == SlotStatus::Success
    }

    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(self, SlotStatus::Failure(_))
    }

    fn encode(self) -> u8 {
        match self {
            SlotStatus::InProgress => 0,
            SlotStatus::Success => 1,
            SlotStatus::Failure(FailureReason::Canceled) => 2,
            SlotStatus::Failure(FailureReason::OriginUnmapped) => 3,
            SlotStatus::Failure(FailureReason::DestinationUnmapped) => 4,
            SlotStatus::Failure(FailureReason::CorridorSearch) => 5,
            SlotStatus::Failure(FailureReason::StraightPath) => 6,
            SlotStatus::Failure(FailureReason::EndpointOutOfTolerance) => 7,
        }
    }

    fn decode(v: u8) -> SlotStatus {
        match v {
            0 => SlotStatus::InProgress,
            1 => SlotStatus::Success,
            2 => SlotStatus::Failure(FailureReason::Canceled),
            3 => SlotStatus::Failure(FailureReason::OriginUnmapped),
            4 => SlotStatus::Failure(FailureReason::DestinationUnmapped),
            5 => SlotStatus::Failure(FailureReason::CorridorSearch),
            6 => SlotStatus::Failure(FailureReason::StraightPath),
            _ => SlotStatus::Failure(FailureReason::EndpointOutOfTolerance),
        }
    }
}

// ── Slots ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SlotPath {
    corners: Vec<NavLocation>,
    length:  f32,
}

#[derive(Default)]
struct Slot {
    status: AtomicU8,
    detail: AtomicU32,
    path:   Mutex<SlotPath>,
}

impl Slot {
    fn reset(&self) {
        self.detail.store(0, Ordering::Relaxed);
        self.status.store(SlotStatus::InProgress.encode(), Ordering::Release);
    }

    fn resolve(&self, status: SlotStatus, detail: QueryStatus) {
        self.detail.store(detail.0, Ordering::Relaxed);
        self.status.store(status.encode(), Ordering::Release);
    }

    fn status(&self) -> SlotStatus {
        SlotStatus::decode(self.status.load(Ordering::Acquire))
    }
}

/// Everything the workers share with the owner.
#[derive(Default)]
struct JobData {
    profile:            AgentProfile,
    origin:             Vec3,
    calculate_distance: bool,
    count:              usize,
    canceled:           AtomicBool,
    destinations:       CapacityBuffer<Vec3>,
    slots:              CapacityBuffer<Slot>,
}

impl JobData {
    #[inline]
    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

// ── FindPathsJob ──────────────────────────────────────────────────────────────

/// Paths from one origin to up to `count` destinations.
///
/// ```text
/// initialize → schedule → (poll status / path) → cancel? → handle completes
///     ↑                                                          │
///     └──────────────────────────────────────────────────────────┘
/// ```
#[derive(Default)]
pub struct FindPathsJob {
    data: Arc<JobData>,
}

impl FindPathsJob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare a batch: grow buffers to fit, copy destinations in, reset every
    /// slot to in-progress and clear the cancel flag.
    ///
    /// With `calculate_distance`, successful slots also report the length of
    /// their corner polyline.
    pub fn initialize<I>(
        &mut self,
        profile: AgentProfile,
        origin: Vec3,
        destinations: I,
        calculate_distance: bool,
    ) where
        I: IntoIterator<Item = Vec3>,
        I::IntoIter: ExactSizeIterator,
    {
        let destinations = destinations.into_iter();
        let count = destinations.len();

        if Arc::get_mut(&mut self.data).is_none() {
            // A previous schedule is still running; leave its buffers to it.
            log::warn!("path job re-initialised while workers still hold it; allocating fresh buffers");
            self.data = Arc::new(JobData::default());
        }
        let Some(data) = Arc::get_mut(&mut self.data) else {
            return;
        };

        data.profile = profile;
        data.origin = origin;
        data.calculate_distance = calculate_distance;
        data.count = count;
        data.canceled.store(false, Ordering::Release);
        data.destinations.grow_to(count);
        data.slots.grow_to(count);
        for (dst, src) in data.destinations.iter_mut().zip(destinations) {
            *dst = src;
        }
        for slot in data.slots.iter().take(count) {
            slot.reset();
        }
    }

    /// Start the batch on `workers`.  Returns immediately.
    pub fn schedule<Q: PathQuery>(&mut self, workers: &PathWorkers<Q>) -> JobHandle {
        if self.data.count == 0 {
            return JobHandle::finished();
        }
        let handle = JobHandle::pending();
        let completion = handle.clone();
        let data = Arc::clone(&self.data);
        let navmesh = Arc::clone(&workers.navmesh);
        let queries = Arc::clone(&workers.queries);
        let params = workers.params;

        workers.threads.spawn(move || {
            (0..data.count).into_par_iter().for_each_init(
                || queries.take(),
                |query, i| execute_slot(&data, i, &mut **query, &navmesh, &params),
            );
            // Buffers must be free before anyone is told the batch is done.
            drop(data);
            completion.complete();
        });
        handle
    }

    /// Request cooperative cancellation.  Idempotent and non-blocking.
    pub fn cancel(&self) {
        self.data.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.data.is_canceled()
    }

    /// Destinations in the current batch.
    pub fn len(&self) -> usize {
        self.data.count
    }

    pub fn is_empty(&self) -> bool {
        self.data.count == 0
    }

    /// Slot capacity retained across batches.
    pub fn capacity(&self) -> usize {
        self.data.slots.capacity()
    }

    /// `true` once every slot has resolved.
    pub fn is_completed(&self) -> bool {
        (0..self.len()).all(|i| !self.status(i).is_in_progress())
    }

    pub fn status(&self, index: usize) -> SlotStatus {
        self.data.slots[..self.data.count]
            .get(index)
            .map_or(SlotStatus::Failure(FailureReason::Canceled), Slot::status)
    }

    /// Raw query status behind a slot's outcome.
    pub fn query_detail(&self, index: usize) -> QueryStatus {
        self.data.slots[..self.data.count]
            .get(index)
            .map_or(QueryStatus::default(), |s| QueryStatus(s.detail.load(Ordering::Relaxed)))
    }

    pub fn destination(&self, index: usize) -> Option<Vec3> {
        self.data.destinations[..self.data.count].get(index).copied()
    }

    /// Corner polyline of a resolved slot; empty for failed slots.  `None`
    /// while the slot is in progress (a worker holds its buffer) or out of
    /// range, so this never waits on a running query.
    pub fn path(&self, index: usize) -> Option<MappedMutexGuard<'_, [NavLocation]>> {
        let slot = self.data.slots[..self.data.count].get(index)?;
        if slot.status().is_in_progress() {
            return None;
        }
        Some(MutexGuard::map(slot.path.lock(), |p| p.corners.as_mut_slice()))
    }

    /// Polyline length of a successful slot; `0.0` unless the batch was
    /// initialised with distance calculation.
    pub fn path_length(&self, index: usize) -> f32 {
        match self.data.slots[..self.data.count].get(index) {
            Some(slot) if slot.status().is_success() => slot.path.lock().length,
            _ => 0.0,
        }
    }

    /// Free all buffers.  Only possible while no schedule is running;
    /// returns `false` otherwise.
    pub fn release(&mut self) -> bool {
        match Arc::get_mut(&mut self.data) {
            Some(data) => {
                data.destinations.release();
                data.slots.release();
                data.count = 0;
                true
            }
            None => false,
        }
    }
}

// ── Worker side ───────────────────────────────────────────────────────────────

/// Compute slot `index`.  Runs on a worker thread.
fn execute_slot<Q: PathQuery>(
    data: &JobData,
    index: usize,
    query: &mut Q,
    navmesh: &NavMeshLock<Q::Mesh>,
    params: &JobParams,
) {
    let slot = &data.slots[index];
    if data.is_canceled() {
        slot.resolve(SlotStatus::Failure(FailureReason::Canceled), QueryStatus::default());
        return;
    }
    let destination = data.destinations[index];

    let mut path = slot.path.lock();
    path.corners.clear();
    path.length = 0.0;

    let outcome = {
        let mut mesh = navmesh.read();
        find_path(&mut mesh, query, data, destination, &mut path.corners, params)
        // Read section ends here; nothing below touches the mesh.
    };

    let (status, detail) = match outcome {
        Ok(detail) => {
            let reached = path
                .corners
                .last()
                .is_some_and(|c| c.position.distance_squared(destination) <= params.endpoint_tolerance_sq);
            if reached {
                if data.calculate_distance {
                    path.length = polyline_length(path.corners.iter().map(|c| c.position));
                }
                (SlotStatus::Success, detail)
            } else {
                (SlotStatus::Failure(FailureReason::EndpointOutOfTolerance), detail)
            }
        }
        Err((reason, detail)) => (SlotStatus::Failure(reason), detail),
    };
    if !status.is_success() {
        path.corners.clear();
    }
    drop(path);
    log::trace!("path slot {index}: {status:?} ({detail:?})");
    slot.resolve(status, detail);
}

/// Steps that need the mesh.  Yields the read section between search slices.
fn find_path<Q: PathQuery>(
    mesh: &mut NavMeshReadGuard<'_, Q::Mesh>,
    query: &mut Q,
    data: &JobData,
    destination: Vec3,
    corners: &mut Vec<NavLocation>,
    params: &JobParams,
) -> Result<QueryStatus, (FailureReason, QueryStatus)> {
    let start = query
        .map_location(&**mesh, data.origin, params.origin_extents, &data.profile)
        .ok_or((FailureReason::OriginUnmapped, QueryStatus::FAILURE))?;
    let end = query
        .map_location(&**mesh, destination, params.endpoint_extents, &data.profile)
        .ok_or((FailureReason::DestinationUnmapped, QueryStatus::FAILURE))?;

    let mut status = query.begin_find_path(&**mesh, start, end, data.profile.area_mask);
    while status.is_in_progress() {
        mesh.yield_to_writers();
        if data.is_canceled() {
            return Err((FailureReason::Canceled, status));
        }
        status = query.update_find_path(&**mesh, params.find_path_iterations);
    }

    let (status, corridor_len) = query.end_find_path(&**mesh);
    if !status.is_success() || corridor_len == 0 {
        return Err((FailureReason::CorridorSearch, status));
    }

    let straight =
        query.find_straight_path(&**mesh, start.position, end.position, corners, params.max_corners);
    if !straight.is_success() || corners.is_empty() {
        return Err((FailureReason::StraightPath, straight));
    }
    Ok(status | straight.detail())
}
