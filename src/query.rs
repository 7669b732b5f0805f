// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Search request descriptor.

use crate::dist::DistanceMetric;
use crate::error::{KernelError, Result};
use crate::types::id::{PointId, QueryId};
use crate::types::point::DataPoint;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Predicate over point ids, evaluated on the worker during a scan.
///
/// It travels over the wire with the query, so it is data rather than a
/// closure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointFilter {
    /// Only these ids are candidates.
    Allow(FxHashSet<PointId>),
    /// Every id except these is a candidate.
    Deny(FxHashSet<PointId>),
    /// Ids in `start..end`.
    Range { start: PointId, end: PointId },
}

impl PointFilter {
    pub fn allow<I: IntoIterator<Item = PointId>>(ids: I) -> Self {
        PointFilter::Allow(ids.into_iter().collect())
    }

    pub fn deny<I: IntoIterator<Item = PointId>>(ids: I) -> Self {
        PointFilter::Deny(ids.into_iter().collect())
    }

    pub fn matches(&self, id: PointId) -> bool {
        match self {
            PointFilter::Allow(ids) => ids.contains(&id),
            PointFilter::Deny(ids) => !ids.contains(&id),
            PointFilter::Range { start, end } => *start <= id && id < *end,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryFields")]
pub struct Query {
    id: QueryId,
    k: usize,
    target: DataPoint,
    metric: DistanceMetric,
    filter: Option<PointFilter>,
}

/// Decoded form of a [`Query`]. Deserialization goes through
/// [`Query::new`], so a decoded query upholds the same checks.
#[derive(Deserialize)]
struct QueryFields {
    id: QueryId,
    k: usize,
    target: DataPoint,
    metric: DistanceMetric,
    filter: Option<PointFilter>,
}

impl TryFrom<QueryFields> for Query {
    type Error = KernelError;

    fn try_from(f: QueryFields) -> Result<Self> {
        Query::new(f.id, f.k, f.target, f.metric, f.filter)
    }
}

impl Query {
    pub fn new(
        id: QueryId,
        k: usize,
        target: DataPoint,
        metric: DistanceMetric,
        filter: Option<PointFilter>,
    ) -> Result<Self> {
        if k == 0 {
            return Err(KernelError::InvalidK(k));
        }
        Ok(Self { id, k, target, metric, filter })
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    /// Maximum number of results.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn target(&self) -> &DataPoint {
        &self.target
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn filter(&self) -> Option<&PointFilter> {
        self.filter.as_ref()
    }

    /// True when `id` passes the optional filter.
    pub fn admits(&self, id: PointId) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(id))
    }
}
