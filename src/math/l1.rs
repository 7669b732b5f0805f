//! L1 (taxicab) distance.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

#[inline(always)]
pub fn l1(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimension mismatch");

    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// L1 distance with early exit once the running sum strictly exceeds `limit`.
#[inline]
pub fn l1_bounded(a: &[f32], b: &[f32], limit: f32) -> Option<f32> {
    debug_assert_eq!(a.len(), b.len(), "Vector dimension mismatch");

    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += (x - y).abs();
        if sum > limit {
            return None;
        }
    }
    Some(sum)
}
