// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Bounded top-K accumulator.

use crate::index::Neighbor;
use crate::query::Query;
use crate::types::id::{PointId, QueryId};

/// Keeps the `k` best neighbors offered so far, sorted ascending.
///
/// Invariants after every call:
/// - `len() <= k`
/// - entries are sorted by [`Neighbor`]'s order (distance, then point id)
/// - the entries are the `k` smallest of everything offered
///
/// A `ResultSet` is plain owned data. Sharing one between threads needs an
/// external lock; the worker scan gives each query its own set and the
/// master merges finished sets afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSet {
    query_id: QueryId,
    k: usize,
    entries: Vec<Neighbor>,
}

impl ResultSet {
    pub fn new(query_id: QueryId, k: usize) -> Self {
        Self {
            query_id,
            k,
            entries: Vec::with_capacity(k.min(1024)),
        }
    }

    pub fn for_query(query: &Query) -> Self {
        Self::new(query.id(), query.k())
    }

    /// Builds one set of size `k` from any number of partial result lists.
    pub fn merged<I, S>(query_id: QueryId, k: usize, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = Neighbor>,
    {
        let mut out = Self::new(query_id, k);
        for part in parts {
            for n in part {
                out.offer_neighbor(n);
            }
        }
        out
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.k
    }

    /// The largest retained entry.
    pub fn worst(&self) -> Option<Neighbor> {
        self.entries.last().copied()
    }

    /// Distance a new candidate must not exceed to have a chance of being
    /// kept. `None` while the set still has room.
    pub fn cutoff(&self) -> Option<f32> {
        if self.is_full() {
            self.worst().map(|n| n.distance)
        } else {
            None
        }
    }

    /// Returns true when the pair was retained.
    pub fn offer(&mut self, id: PointId, distance: f32) -> bool {
        self.offer_neighbor(Neighbor { id, distance })
    }

    pub fn offer_neighbor(&mut self, candidate: Neighbor) -> bool {
        if self.k == 0 {
            return false;
        }

        if self.entries.len() >= self.k {
            match self.entries.last() {
                Some(worst) if candidate < *worst => {
                    self.entries.pop();
                }
                _ => return false,
            }
        }

        // Position by (distance, id); entries equal on both go after existing ones.
        let pos = self.entries.partition_point(|e| *e <= candidate);
        self.entries.insert(pos, candidate);
        true
    }

    /// Offers every entry of `other` into this set.
    pub fn merge(&mut self, other: &ResultSet) {
        debug_assert_eq!(self.query_id, other.query_id, "merging result sets of different queries");
        for n in &other.entries {
            self.offer_neighbor(*n);
        }
    }

    /// Sorted copy of the current contents.
    pub fn snapshot(&self) -> Vec<Neighbor> {
        self.entries.clone()
    }

    pub fn as_slice(&self) -> &[Neighbor] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<PointId> {
        self.entries.iter().map(|n| n.id).collect()
    }

    pub fn distances(&self) -> Vec<f32> {
        self.entries.iter().map(|n| n.distance).collect()
    }

    pub fn into_neighbors(self) -> Vec<Neighbor> {
        self.entries
    }
}
