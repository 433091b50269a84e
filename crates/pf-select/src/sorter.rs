//! Incremental candidate sorter.
//!
//! Targets move a little each frame and candidate ranks change slowly, so the
//! previous order is almost always nearly right.  An insertion sort seeded
//! with it runs in O(n) when nothing moved and O(n·k) when k entries did.

use pf_core::{Candidate, CandidateId, CandidateList, Vec3};

/// Cached `{identity, position}` arrays, ordered by distance to the last
/// target.
#[derive(Default, Debug)]
pub struct SortedCandidates {
    source:    Option<CandidateList>,
    ids:       Vec<CandidateId>,
    positions: Vec<Vec3>,
    keys:      Vec<f32>,
}

impl SortedCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reorder by squared distance to `target`, nearest first or farthest
    /// first.  Returns the number of key comparisons performed.
    ///
    /// If `list` is not the snapshot cached last time, the arrays are rebuilt
    /// from it in natural order before sorting.
    pub fn sort_nodes(&mut self, list: &CandidateList, target: Vec3, farthest_first: bool) -> usize {
        let cached = self.source.as_ref().is_some_and(|s| s.same_list(list));
        if !cached {
            self.ids.clear();
            self.positions.clear();
            self.ids.extend(list.iter().map(|c| c.id));
            self.positions.extend(list.iter().map(|c| c.position));
            self.source = Some(list.clone());
        }

        self.keys.clear();
        self.keys.extend(self.positions.iter().map(|p| p.distance_squared(target)));

        let mut comparisons = 0;
        for i in 1..self.keys.len() {
            let mut j = i;
            while j > 0 {
                comparisons += 1;
                let (prev, cur) = (self.keys[j - 1], self.keys[j]);
                let out_of_order = if farthest_first { prev < cur } else { prev > cur };
                if !out_of_order {
                    break;
                }
                self.keys.swap(j - 1, j);
                self.ids.swap(j - 1, j);
                self.positions.swap(j - 1, j);
                j -= 1;
            }
        }
        comparisons
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[CandidateId] {
        &self.ids
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn get(&self, index: usize) -> Option<Candidate> {
        Some(Candidate { id: *self.ids.get(index)?, position: *self.positions.get(index)? })
    }

    /// Drop the cached snapshot and free the arrays.
    pub fn release(&mut self) {
        *self = Self::default();
    }
}
