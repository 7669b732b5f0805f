// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Top-K selection and the brute-force shard scan.

pub mod brute_force;
pub mod result_set;

use crate::types::id::PointId;
use core::cmp::Ordering;
use serde::{Deserialize, Serialize};

/// One `(point id, distance)` pair in a result set.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Neighbor {
    // Sort order: distance ascending, then id ascending (stable).
    pub id: PointId,
    pub distance: f32,
}

impl Neighbor {
    pub fn new(id: PointId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance.total_cmp(&other.distance) {
            Ordering::Equal => self.id.cmp(&other.id),
            other_ord => other_ord,
        }
    }
}
