// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Distance metrics over [`DataPoint`]s.
//!
//! `Euclidean` and `Manhattan` are true metrics: non-negative, zero only for
//! equal vectors, symmetric, and they satisfy the triangle inequality.
//!
//! `Cosine` is a bounded pseudo-metric. It is computed as `(1 - cos θ) / 2`
//! and lies in `[0, 1]`. It is symmetric and non-negative, but any two
//! vectors pointing the same way are at distance 0 and the triangle
//! inequality is not guaranteed. [`DistanceMetric::is_true_metric`] reports
//! this so callers do not treat it as a metric space.

use crate::error::{KernelError, Result};
use crate::math::dot::{dot, norm_sq};
use crate::math::l1::{l1, l1_bounded};
use crate::math::l2::{l2_sq, l2_sq_bounded};
use crate::types::point::DataPoint;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// L2 norm of the difference vector.
    #[default]
    Euclidean,
    /// L1 norm of the difference vector.
    Manhattan,
    /// `(1 - cosine similarity) / 2`.
    Cosine,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 3] = [
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
        DistanceMetric::Cosine,
    ];

    /// Calculate the distance between two points.
    pub fn calculate(&self, a: &DataPoint, b: &DataPoint) -> Result<f32> {
        check_dims(a, b)?;
        let (a, b) = (a.as_slice(), b.as_slice());

        let d = match self {
            DistanceMetric::Euclidean => l2_sq(a, b).sqrt() as f32,
            DistanceMetric::Manhattan => l1(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        };
        Ok(d)
    }

    /// Like [`calculate`](Self::calculate), but returns `Ok(None)` as soon as
    /// the distance is known to be strictly greater than `cutoff`.
    ///
    /// Euclidean and Manhattan stop accumulating early. Cosine has no
    /// monotone partial sum, so it is computed in full and compared. A NaN
    /// cutoff bounds nothing and falls back to the full distance.
    pub fn calculate_with_cutoff(
        &self,
        a: &DataPoint,
        b: &DataPoint,
        cutoff: f32,
    ) -> Result<Option<f32>> {
        if cutoff.is_nan() {
            return self.calculate(a, b).map(Some);
        }
        check_dims(a, b)?;
        if cutoff < 0.0 {
            return Ok(None);
        }
        let (a, b) = (a.as_slice(), b.as_slice());

        let d = match self {
            DistanceMetric::Euclidean => {
                let limit = cutoff as f64;
                l2_sq_bounded(a, b, limit * limit).map(|sq| sq.sqrt() as f32)
            }
            DistanceMetric::Manhattan => l1_bounded(a, b, cutoff),
            DistanceMetric::Cosine => Some(cosine_distance(a, b)),
        };
        // sqrt can land just above the cutoff even when the squared sum did not.
        Ok(d.filter(|d| *d <= cutoff))
    }

    /// Whether this variant satisfies all four metric-space axioms.
    pub fn is_true_metric(&self) -> bool {
        match self {
            DistanceMetric::Euclidean | DistanceMetric::Manhattan => true,
            DistanceMetric::Cosine => false,
        }
    }

    /// Upper bound of the distance, if the metric is bounded.
    pub fn max_distance(&self) -> Option<f32> {
        match self {
            DistanceMetric::Cosine => Some(1.0),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

#[inline]
fn check_dims(a: &DataPoint, b: &DataPoint) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(KernelError::DimensionMismatch {
            expected: a.dim(),
            found: b.dim(),
        });
    }
    Ok(())
}

/// Zero-magnitude inputs: two zero vectors are identical (0.0); a zero vector
/// against anything else has no direction and is placed at the maximum (1.0).
///
/// The denominator is `sqrt(|a|^2 * |b|^2)` rather than `|a| * |b|`: for
/// positively collinear inputs, including a point against itself, this
/// yields a ratio of exactly 1.0 and so a distance of exactly 0.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let sq_a = norm_sq(a);
    let sq_b = norm_sq(b);

    if sq_a == 0.0 && sq_b == 0.0 {
        return 0.0;
    }
    if sq_a == 0.0 || sq_b == 0.0 {
        return 1.0;
    }

    let cos = (dot(a, b) / (sq_a * sq_b).sqrt()).clamp(-1.0, 1.0);
    ((1.0 - cos) / 2.0) as f32
}
