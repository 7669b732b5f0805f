// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Brute-force scan.

use crate::index::result_set::ResultSet;
use crate::query::Query;
use crate::types::point::DataPoint;

/// Outcome of scanning one shard for one query.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub results: ResultSet,
    /// Points that passed the filter and were measured.
    pub scanned: usize,
    /// Points that could not be measured: their dimensionality differs from
    /// the target, or their distance came out NaN.
    pub skipped: usize,
}

/// A stateless scanner that measures every point against the query target.
#[derive(Default, Clone, Copy, Debug)]
pub struct BruteForceScan;

impl BruteForceScan {
    /// Scans `points` and returns the local top-K.
    ///
    /// Once the result set is full its worst distance is used as a cutoff, so
    /// candidates that cannot make the cut stop accumulating early. A point
    /// with the wrong dimensionality or a NaN distance is counted in
    /// `skipped` and never enters the result set.
    pub fn search<'a, I>(&self, query: &Query, points: I) -> ScanOutcome
    where
        I: IntoIterator<Item = &'a DataPoint>,
    {
        let mut results = ResultSet::for_query(query);
        let mut scanned = 0;
        let mut skipped = 0;
        let metric = query.metric();
        let target = query.target();

        for point in points {
            if !query.admits(point.id()) {
                continue;
            }

            let measured = match results.cutoff() {
                Some(cutoff) => metric.calculate_with_cutoff(target, point, cutoff),
                None => metric.calculate(target, point).map(Some),
            };

            match measured {
                Ok(Some(distance)) if distance.is_nan() => skipped += 1,
                Ok(Some(distance)) => {
                    scanned += 1;
                    results.offer(point.id(), distance);
                }
                Ok(None) => scanned += 1,
                Err(_) => skipped += 1,
            }
        }

        ScanOutcome { results, scanned, skipped }
    }
}
