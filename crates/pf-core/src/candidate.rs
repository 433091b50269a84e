//! Candidate destination nodes.
//!
//! The host owns each agent's node list and may swap it for a new one at any
//! time.  A [`CandidateList`] is a cheap shared snapshot of that list; two
//! snapshots are "the same list" only if they share storage, which is how the
//! node sorter decides between an in-place re-sort and a full rebuild.

use std::sync::Arc;

use crate::{CandidateId, Vec3};

/// One potential destination node.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Candidate {
    /// Index in the agent's full node list.
    pub id:       CandidateId,
    pub position: Vec3,
}

/// Shared, immutable snapshot of an agent's candidate node list.
#[derive(Clone, Debug)]
pub struct CandidateList(Arc<[Candidate]>);

impl CandidateList {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self(candidates.into())
    }

    /// Build a list whose identities are the positions' natural indices.
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        let candidates: Vec<Candidate> = positions
            .into_iter()
            .enumerate()
            .map(|(i, position)| Candidate { id: CandidateId(i as u32), position })
            .collect();
        Self::new(candidates)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.0.iter()
    }

    /// `true` if both snapshots share storage and length, i.e. the host has
    /// not replaced the list since `other` was taken.
    pub fn same_list(&self, other: &CandidateList) -> bool {
        Arc::ptr_eq(&self.0, &other.0) && self.0.len() == other.0.len()
    }
}

impl Default for CandidateList {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}
