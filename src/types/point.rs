// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Data point: an identified, immutable float vector.

use crate::types::id::PointId;
use core::ops::Index;
use serde::{Deserialize, Serialize};

/// A point in the dataset.
///
/// Dimensionality is not fixed by the type. Comparing two points of
/// different lengths fails at distance time with
/// [`KernelError::DimensionMismatch`](crate::error::KernelError).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    id: PointId,
    vector: Vec<f32>,
}

impl DataPoint {
    pub fn new(id: PointId, vector: Vec<f32>) -> Self {
        Self { id, vector }
    }

    pub fn id(&self) -> PointId {
        self.id
    }

    /// Returns a slice of the vector data.
    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    /// True when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }

    /// True when no component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.vector.iter().all(|v| v.is_finite())
    }

    pub fn into_parts(self) -> (PointId, Vec<f32>) {
        (self.id, self.vector)
    }
}

impl<'a> IntoIterator for &'a DataPoint {
    type Item = &'a f32;
    type IntoIter = core::slice::Iter<'a, f32>;

    fn into_iter(self) -> Self::IntoIter {
        self.vector.iter()
    }
}

impl Index<usize> for DataPoint {
    type Output = f32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.vector[index]
    }
}
