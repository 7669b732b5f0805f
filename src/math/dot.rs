//! Dot product and magnitude.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

/// Computes the dot product of two vectors.
///
/// Accumulates in f64 so long vectors (1000+ dims) keep enough precision
/// for the cosine ratio.
#[inline(always)]
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let mut sum = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += (*x as f64) * (*y as f64);
    }
    sum
}

/// Squared magnitude ||a||^2, summed in the same order as [`dot`] so that
/// `dot(a, a) == norm_sq(a)` exactly.
#[inline]
pub fn norm_sq(a: &[f32]) -> f64 {
    let mut sum = 0.0f64;
    for x in a {
        sum += (*x as f64) * (*x as f64);
    }
    sum
}
