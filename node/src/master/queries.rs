// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Pending and completed query table.
//!
//! Lifecycle per query id:
//! `Submitted -> AwaitingReplies -> Complete`, or `Abandoned` on shutdown.
//!
//! A worker that disconnects is dropped from every query still waiting on
//! it and recorded as lost. A query whose remaining responders are all lost
//! completes with whatever replies arrived, possibly none.

use crate::errors::MeshError;
use knnmesh_kernel::{DistanceMetric, Neighbor, Query, QueryId, ResultSet, WorkerId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Submitted,
    AwaitingReplies,
    Complete,
    Abandoned,
}

impl QueryStatus {
    /// No further replies will change the entry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryStatus::Complete | QueryStatus::Abandoned)
    }
}

#[derive(Debug)]
struct QueryEntry {
    query: Query,
    status: QueryStatus,
    expected: usize,
    outstanding: BTreeSet<WorkerId>,
    replies: BTreeMap<WorkerId, Vec<Neighbor>>,
    received: usize,
    lost: BTreeSet<WorkerId>,
    skipped_points: u64,
    merged: Option<ResultSet>,
    submitted_at: Instant,
}

impl QueryEntry {
    fn complete(&mut self) -> Duration {
        let parts = std::mem::take(&mut self.replies);
        self.merged = Some(ResultSet::merged(self.query.id(), self.query.k(), parts.into_values()));
        self.status = QueryStatus::Complete;
        self.submitted_at.elapsed()
    }
}

/// Snapshot of one query for callers and the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub query_id: QueryId,
    pub status: QueryStatus,
    /// Set once the merged result is final. An empty `results` with
    /// `complete == true` means every responder was lost or nothing matched.
    pub complete: bool,
    pub k: usize,
    pub metric: DistanceMetric,
    pub expected: usize,
    pub received: usize,
    pub lost: usize,
    pub skipped_points: u64,
    pub results: Option<Vec<Neighbor>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyOutcome {
    /// Recorded; other workers still owe replies.
    Pending,
    /// This reply completed the query.
    Completed(Duration),
    /// Duplicate, late, or from a worker the query never waited on.
    Ignored,
}

#[derive(Debug, Default)]
pub struct QueryTable {
    entries: HashMap<QueryId, QueryEntry>,
    last_id: QueryId,
}

impl QueryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id. Ids start at 1 and are never reused.
    pub fn next_id(&mut self) -> QueryId {
        self.last_id = self.last_id.next();
        self.last_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates a `Submitted` entry expecting one reply from each responder.
    pub fn insert(&mut self, query: Query, responders: &[WorkerId]) {
        let entry = QueryEntry {
            status: QueryStatus::Submitted,
            expected: responders.len(),
            outstanding: responders.iter().copied().collect(),
            replies: BTreeMap::new(),
            received: 0,
            lost: BTreeSet::new(),
            skipped_points: 0,
            merged: None,
            submitted_at: Instant::now(),
            query,
        };
        self.entries.insert(entry.query.id(), entry);
    }

    /// Moves a submitted query to `AwaitingReplies` once the broadcast is
    /// queued. Completes it immediately if every responder was lost while
    /// dispatching.
    pub fn mark_dispatched(&mut self, id: QueryId) -> Option<Duration> {
        let entry = self.entries.get_mut(&id)?;
        if entry.status != QueryStatus::Submitted {
            return None;
        }
        entry.status = QueryStatus::AwaitingReplies;
        if entry.outstanding.is_empty() {
            return Some(entry.complete());
        }
        None
    }

    pub fn record_reply(
        &mut self,
        worker: WorkerId,
        id: QueryId,
        neighbors: Vec<Neighbor>,
        skipped: u32,
    ) -> Result<ReplyOutcome, MeshError> {
        let entry = self.entries.get_mut(&id).ok_or(MeshError::UnknownQueryId(id))?;

        if entry.status.is_terminal() || !entry.outstanding.remove(&worker) {
            return Ok(ReplyOutcome::Ignored);
        }

        entry.skipped_points += skipped as u64;
        entry.received += 1;
        entry.replies.insert(worker, neighbors);

        if entry.status == QueryStatus::AwaitingReplies && entry.outstanding.is_empty() {
            return Ok(ReplyOutcome::Completed(entry.complete()));
        }
        Ok(ReplyOutcome::Pending)
    }

    /// Stops waiting on `worker` everywhere. Returns the queries this
    /// completed, with their latency.
    pub fn worker_lost(&mut self, worker: WorkerId) -> Vec<(QueryId, Duration)> {
        let mut completed = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if entry.status.is_terminal() || !entry.outstanding.remove(&worker) {
                continue;
            }
            entry.lost.insert(worker);
            if entry.status == QueryStatus::AwaitingReplies && entry.outstanding.is_empty() {
                completed.push((*id, entry.complete()));
            }
        }
        completed
    }

    /// Marks every unfinished query `Abandoned`. Returns how many.
    pub fn abandon_all(&mut self) -> usize {
        let mut count = 0;
        for entry in self.entries.values_mut() {
            if !entry.status.is_terminal() {
                entry.status = QueryStatus::Abandoned;
                entry.outstanding.clear();
                entry.replies.clear();
                count += 1;
            }
        }
        count
    }

    pub fn status(&self, id: QueryId) -> Result<QueryStatus, MeshError> {
        self.entries
            .get(&id)
            .map(|e| e.status)
            .ok_or(MeshError::UnknownQueryId(id))
    }

    /// `Ok(None)` while replies are outstanding.
    pub fn results(&self, id: QueryId) -> Result<Option<Vec<Neighbor>>, MeshError> {
        let entry = self.entries.get(&id).ok_or(MeshError::UnknownQueryId(id))?;
        match entry.status {
            QueryStatus::Complete => Ok(entry.merged.as_ref().map(|m| m.snapshot())),
            QueryStatus::Abandoned => Err(MeshError::QueryAbandoned(id)),
            QueryStatus::Submitted | QueryStatus::AwaitingReplies => Ok(None),
        }
    }

    pub fn report(&self, id: QueryId) -> Result<QueryReport, MeshError> {
        let entry = self.entries.get(&id).ok_or(MeshError::UnknownQueryId(id))?;
        Ok(QueryReport {
            query_id: id,
            status: entry.status,
            complete: entry.status == QueryStatus::Complete,
            k: entry.query.k(),
            metric: entry.query.metric(),
            expected: entry.expected,
            received: entry.received,
            lost: entry.lost.len(),
            skipped_points: entry.skipped_points,
            results: entry.merged.as_ref().map(|m| m.snapshot()),
        })
    }

    pub fn remove(&mut self, id: QueryId) -> Result<(), MeshError> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(MeshError::UnknownQueryId(id))
    }
}
