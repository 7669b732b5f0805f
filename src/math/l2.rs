//! Squared L2 distance.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

/// Computes the squared L2 distance between two vectors.
/// ||a - b||^2
///
/// Differences and the sum are taken in f64, so large components do not
/// overflow before the final square root.
#[inline(always)]
pub fn l2_sq(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimension mismatch");

    let mut sum = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = (*x as f64) - (*y as f64);
        sum += diff * diff;
    }
    sum
}

/// Squared L2 distance that gives up once the running sum strictly exceeds
/// `limit_sq`. Partial sums only grow, so `None` means the full distance
/// exceeds the limit too. Accumulates exactly like [`l2_sq`].
#[inline]
pub fn l2_sq_bounded(a: &[f32], b: &[f32], limit_sq: f64) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len(), "Vector dimension mismatch");

    let mut sum = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = (*x as f64) - (*y as f64);
        sum += diff * diff;
        if sum > limit_sq {
            return None;
        }
    }
    Some(sum)
}
