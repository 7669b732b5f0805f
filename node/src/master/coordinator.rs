// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Master-side cluster state: who is registered, which worker owns each
//! point, and what every query is still waiting for.
//!
//! One `Coordinator` sits behind a single mutex. Every method runs to
//! completion without awaiting, so a worker loss and a reply for the same
//! query can never interleave half-applied.

use crate::errors::{MeshError, Result};
use crate::master::membership::{Outbound, Registry, WorkerInfo};
use crate::master::queries::{QueryReport, QueryStatus, QueryTable, ReplyOutcome};
use crate::network::protocol::WireMessage;
use crate::telemetry;
use knnmesh_kernel::{DataPoint, DistanceMetric, Neighbor, PointFilter, PointId, Query, QueryId, WorkerId};
use rustc_hash::FxHashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct Coordinator {
    registry: Registry,
    queries: QueryTable,
    owners: FxHashMap<PointId, WorkerId>,
    shutting_down: bool,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn register(&mut self, peer: SocketAddr, outbound: Outbound) -> Result<WorkerId> {
        if self.shutting_down {
            return Err(MeshError::ShuttingDown);
        }
        let id = self.registry.register(peer, outbound);
        metrics::counter!(telemetry::WORKERS_REGISTERED, 1);
        metrics::gauge!(telemetry::WORKERS_ACTIVE, self.registry.len() as f64);
        info!(worker = %id, %peer, "Worker registered");
        Ok(id)
    }

    /// Sends a point to its current owner, or to the next worker in rotation
    /// when the point is new or its owner is gone. A worker whose queue is
    /// closed is treated as lost and the point moves on.
    pub fn route_point(&mut self, point: DataPoint) -> Result<WorkerId> {
        if self.shutting_down {
            return Err(MeshError::ShuttingDown);
        }

        check_vector(&point)?;

        let point_id = point.id();
        let mut preferred = self
            .owners
            .get(&point_id)
            .copied()
            .filter(|w| self.registry.is_active(*w));
        let mut msg = WireMessage::AddPoint { point };

        loop {
            let target = match preferred.take() {
                Some(w) => w,
                None => self
                    .registry
                    .next_round_robin()
                    .ok_or(MeshError::NoWorkersAvailable)?,
            };

            match self.registry.send(target, msg) {
                Ok(()) => {
                    self.owners.insert(point_id, target);
                    self.registry.note_routed(target);
                    metrics::counter!(telemetry::POINTS_ROUTED, 1);
                    debug!(point = %point_id, worker = %target, "Point routed");
                    return Ok(target);
                }
                Err(returned) => {
                    msg = returned;
                    self.worker_lost(target);
                }
            }
        }
    }

    /// Asks the owning worker to drop a point. `false` if no live worker
    /// holds it.
    pub fn remove_point(&mut self, id: PointId) -> Result<bool> {
        if self.shutting_down {
            return Err(MeshError::ShuttingDown);
        }
        let Some(owner) = self.owners.remove(&id) else {
            return Ok(false);
        };
        if self.registry.send(owner, WireMessage::RemovePoint { id }).is_err() {
            self.worker_lost(owner);
            return Ok(false);
        }
        Ok(true)
    }

    /// Registers a query and broadcasts it to every active worker.
    ///
    /// The query expects exactly one reply per worker active at this moment.
    /// Workers that join later are not asked.
    pub fn submit(
        &mut self,
        target: DataPoint,
        metric: DistanceMetric,
        k: usize,
        filter: Option<PointFilter>,
    ) -> Result<QueryId> {
        if self.shutting_down {
            return Err(MeshError::ShuttingDown);
        }
        check_vector(&target)?;
        let responders = self.registry.active_ids();
        if responders.is_empty() {
            return Err(MeshError::NoWorkersAvailable);
        }

        let query = Query::new(self.queries.next_id(), k, target, metric, filter)?;
        let id = query.id();
        self.queries.insert(query.clone(), &responders);

        let failed: Vec<WorkerId> = responders
            .iter()
            .copied()
            .filter(|w| {
                self.registry
                    .send(*w, WireMessage::FindKNearest { query: query.clone() })
                    .is_err()
            })
            .collect();
        for w in failed {
            self.worker_lost(w);
        }

        metrics::counter!(telemetry::QUERIES_SUBMITTED, 1);
        debug!(query = %id, k, metric = metric.name(), workers = responders.len(), "Query broadcast");

        if let Some(elapsed) = self.queries.mark_dispatched(id) {
            Self::note_completed(id, elapsed);
        }
        Ok(id)
    }

    pub fn on_reply(
        &mut self,
        worker: WorkerId,
        query_id: QueryId,
        neighbors: Vec<Neighbor>,
        skipped: u32,
    ) -> Result<ReplyOutcome> {
        metrics::counter!(telemetry::REPLIES_RECEIVED, 1);
        let outcome = self.queries.record_reply(worker, query_id, neighbors, skipped)?;
        match outcome {
            ReplyOutcome::Completed(elapsed) => Self::note_completed(query_id, elapsed),
            ReplyOutcome::Ignored => warn!(query = %query_id, worker = %worker, "Reply from a worker the query is not waiting on"),
            ReplyOutcome::Pending => {}
        }
        Ok(outcome)
    }

    /// Drops a worker: purges it from the registry, forgets the points it
    /// owned and stops every query from waiting on it. Safe to call more
    /// than once; only the first call has an effect.
    pub fn worker_lost(&mut self, worker: WorkerId) -> bool {
        let Some(entry) = self.registry.disconnect(worker) else {
            return false;
        };

        let before = self.owners.len();
        self.owners.retain(|_, owner| *owner != worker);
        let orphaned = before - self.owners.len();

        for (id, elapsed) in self.queries.worker_lost(worker) {
            Self::note_completed(id, elapsed);
        }

        metrics::counter!(telemetry::WORKERS_DISCONNECTED, 1);
        metrics::gauge!(telemetry::WORKERS_ACTIVE, self.registry.len() as f64);
        warn!(worker = %worker, peer = %entry.peer, orphaned, "Worker lost");
        true
    }

    /// Abandons unfinished queries and tells every worker to stop. Returns
    /// `false` if shutdown had already begun.
    pub fn begin_shutdown(&mut self) -> bool {
        if self.shutting_down {
            return false;
        }
        self.shutting_down = true;

        let abandoned = self.queries.abandon_all();
        let workers = self.registry.drain();
        for entry in &workers {
            let _ = entry.outbound().send(WireMessage::Shutdown);
        }
        self.owners.clear();

        metrics::gauge!(telemetry::WORKERS_ACTIVE, 0.0);
        info!(abandoned, workers = workers.len(), "Shutdown started");
        true
    }

    pub fn results(&self, id: QueryId) -> Result<Option<Vec<Neighbor>>> {
        self.queries.results(id)
    }

    pub fn report(&self, id: QueryId) -> Result<QueryReport> {
        self.queries.report(id)
    }

    pub fn status(&self, id: QueryId) -> Result<QueryStatus> {
        self.queries.status(id)
    }

    pub fn forget(&mut self, id: QueryId) -> Result<()> {
        self.queries.remove(id)
    }

    pub fn num_workers(&self) -> usize {
        self.registry.len()
    }

    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.registry.infos()
    }

    pub fn num_points(&self) -> usize {
        self.owners.len()
    }

    pub fn owner_of(&self, id: PointId) -> Option<WorkerId> {
        self.owners.get(&id).copied()
    }

    fn note_completed(id: QueryId, elapsed: Duration) {
        metrics::counter!(telemetry::QUERIES_COMPLETED, 1);
        metrics::histogram!(telemetry::QUERY_DURATION, elapsed.as_secs_f64());
        debug!(query = %id, elapsed_ms = elapsed.as_millis() as u64, "Query complete");
    }
}

/// Points and targets must be non-empty and finite. A NaN component would
/// otherwise reach a worker and poison its distance comparisons.
fn check_vector(point: &DataPoint) -> Result<()> {
    if point.dim() == 0 {
        return Err(MeshError::InvalidInput("vector must not be empty".to_string()));
    }
    if !point.is_finite() {
        return Err(MeshError::InvalidInput(format!(
            "vector for point {} contains NaN or infinity",
            point.id()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn peer() -> SocketAddr {
        "127.0.0.1:1".parse().unwrap()
    }

    fn point(id: u64, v: &[f32]) -> DataPoint {
        DataPoint::new(PointId(id), v.to_vec())
    }

    fn join(coord: &mut Coordinator) -> (WorkerId, UnboundedReceiver<WireMessage>) {
        let (tx, rx) = unbounded_channel();
        (coord.register(peer(), tx).unwrap(), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<WireMessage>) -> Vec<WireMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_points_spread_round_robin() {
        let mut coord = Coordinator::new();
        let (a, mut rx_a) = join(&mut coord);
        let (b, mut rx_b) = join(&mut coord);

        let owners: Vec<_> = (0..4)
            .map(|i| coord.route_point(point(i, &[i as f32])).unwrap())
            .collect();
        assert_eq!(owners, vec![a, b, a, b]);
        assert_eq!(drain(&mut rx_a).len(), 2);
        assert_eq!(drain(&mut rx_b).len(), 2);
        assert_eq!(coord.num_points(), 4);
    }

    #[test]
    fn test_readding_a_point_goes_to_its_owner() {
        let mut coord = Coordinator::new();
        let (a, _rx_a) = join(&mut coord);
        let (_b, _rx_b) = join(&mut coord);

        assert_eq!(coord.route_point(point(7, &[1.0])).unwrap(), a);
        assert_eq!(coord.route_point(point(7, &[2.0])).unwrap(), a);
        assert_eq!(coord.num_points(), 1);
    }

    #[test]
    fn test_dead_queue_reroutes_and_drops_worker() {
        let mut coord = Coordinator::new();
        let (a, rx_a) = join(&mut coord);
        let (b, mut rx_b) = join(&mut coord);
        drop(rx_a);

        assert_eq!(coord.route_point(point(1, &[0.0])).unwrap(), b);
        assert_eq!(coord.num_workers(), 1);
        assert!(coord.workers().iter().all(|w| w.id != a));
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_no_workers() {
        let mut coord = Coordinator::new();
        assert!(matches!(
            coord.route_point(point(1, &[0.0])),
            Err(MeshError::NoWorkersAvailable)
        ));
        assert!(matches!(
            coord.submit(point(0, &[0.0]), DistanceMetric::Euclidean, 1, None),
            Err(MeshError::NoWorkersAvailable)
        ));
    }

    #[test]
    fn test_non_finite_vectors_never_reach_workers() {
        let mut coord = Coordinator::new();
        let (_a, mut rx) = join(&mut coord);

        for bad in [vec![f32::NAN, 0.0], vec![f32::INFINITY, 0.0], Vec::new()] {
            assert!(matches!(
                coord.route_point(point(1, &bad)),
                Err(MeshError::InvalidInput(_))
            ));
            assert!(matches!(
                coord.submit(point(0, &bad), DistanceMetric::Euclidean, 1, None),
                Err(MeshError::InvalidInput(_))
            ));
        }
        assert!(drain(&mut rx).is_empty());
        assert_eq!(coord.num_points(), 0);
    }

    #[test]
    fn test_worker_joining_after_submit_is_not_asked() {
        let mut coord = Coordinator::new();
        let (a, _rx_a) = join(&mut coord);
        let id = coord
            .submit(point(0, &[0.0]), DistanceMetric::Euclidean, 1, None)
            .unwrap();

        let (late, mut rx_late) = join(&mut coord);
        assert!(drain(&mut rx_late).is_empty());
        assert_eq!(coord.report(id).unwrap().expected, 1);

        // A reply from the late worker does not count toward completion.
        let stray = coord
            .on_reply(late, id, vec![Neighbor::new(PointId(9), 0.0)], 0)
            .unwrap();
        assert_eq!(stray, ReplyOutcome::Ignored);
        assert_eq!(coord.results(id).unwrap(), None);

        coord
            .on_reply(a, id, vec![Neighbor::new(PointId(1), 1.0)], 0)
            .unwrap();
        assert_eq!(
            coord.results(id).unwrap(),
            Some(vec![Neighbor::new(PointId(1), 1.0)])
        );
    }

    #[test]
    fn test_zero_k_is_rejected_before_broadcast() {
        let mut coord = Coordinator::new();
        let (_a, mut rx) = join(&mut coord);
        let err = coord
            .submit(point(0, &[0.0]), DistanceMetric::Euclidean, 0, None)
            .unwrap_err();
        assert!(matches!(err, MeshError::Kernel(_)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_query_merges_replies_from_all_workers() {
        let mut coord = Coordinator::new();
        let (a, mut rx_a) = join(&mut coord);
        let (b, mut rx_b) = join(&mut coord);

        let id = coord
            .submit(point(0, &[0.0]), DistanceMetric::Euclidean, 2, None)
            .unwrap();
        assert!(matches!(drain(&mut rx_a).as_slice(), [WireMessage::FindKNearest { .. }]));
        assert!(matches!(drain(&mut rx_b).as_slice(), [WireMessage::FindKNearest { .. }]));

        let near = |i, d| Neighbor::new(PointId(i), d);
        coord.on_reply(a, id, vec![near(1, 1.0), near(2, 4.0)], 0).unwrap();
        assert_eq!(coord.results(id).unwrap(), None);
        coord.on_reply(b, id, vec![near(3, 2.0)], 0).unwrap();

        assert_eq!(
            coord.results(id).unwrap(),
            Some(vec![near(1, 1.0), near(3, 2.0)])
        );
    }

    #[test]
    fn test_loss_completes_waiting_query_and_orphans_points() {
        let mut coord = Coordinator::new();
        let (a, _rx_a) = join(&mut coord);
        let (b, _rx_b) = join(&mut coord);
        coord.route_point(point(1, &[1.0])).unwrap();
        coord.route_point(point(2, &[2.0])).unwrap();

        let id = coord
            .submit(point(0, &[0.0]), DistanceMetric::Euclidean, 5, None)
            .unwrap();
        coord
            .on_reply(a, id, vec![Neighbor::new(PointId(1), 1.0)], 0)
            .unwrap();

        assert!(coord.worker_lost(b));
        assert!(!coord.worker_lost(b));

        let report = coord.report(id).unwrap();
        assert!(report.complete);
        assert_eq!(report.lost, 1);
        assert_eq!(report.results.unwrap().len(), 1);
        assert_eq!(coord.owner_of(PointId(2)), None);
        assert_eq!(coord.num_points(), 1);
    }

    #[test]
    fn test_remove_point_goes_to_owner() {
        let mut coord = Coordinator::new();
        let (_a, mut rx) = join(&mut coord);
        coord.route_point(point(3, &[3.0])).unwrap();
        drain(&mut rx);

        assert!(coord.remove_point(PointId(3)).unwrap());
        assert_eq!(drain(&mut rx), vec![WireMessage::RemovePoint { id: PointId(3) }]);
        assert!(!coord.remove_point(PointId(3)).unwrap());
    }

    #[test]
    fn test_shutdown_abandons_and_notifies() {
        let mut coord = Coordinator::new();
        let (_a, mut rx) = join(&mut coord);
        let id = coord
            .submit(point(0, &[0.0]), DistanceMetric::Cosine, 1, None)
            .unwrap();
        drain(&mut rx);

        assert!(coord.begin_shutdown());
        assert!(!coord.begin_shutdown());
        assert_eq!(drain(&mut rx), vec![WireMessage::Shutdown]);
        assert!(matches!(coord.results(id), Err(MeshError::QueryAbandoned(_))));
        assert!(matches!(
            coord.route_point(point(1, &[0.0])),
            Err(MeshError::ShuttingDown)
        ));
        assert!(matches!(
            coord.register(peer(), unbounded_channel().0),
            Err(MeshError::ShuttingDown)
        ));
    }
}
