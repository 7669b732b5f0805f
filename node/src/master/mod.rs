// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Master runtime.
//!
//! The master accepts worker connections, routes points across them and
//! fans queries out, merging one partial top-K per worker into the final
//! answer. All client calls are non-blocking: `submit_query` returns an id
//! and results are polled with `get_query_results`.

pub mod connection;
pub mod coordinator;
pub mod membership;
pub mod queries;

pub use coordinator::Coordinator;
pub use membership::{WorkerInfo, WorkerState};
pub use queries::{QueryReport, QueryStatus};

use crate::config::MasterConfig;
use crate::errors::{MeshError, Result};
use knnmesh_kernel::{DataPoint, DistanceMetric, Neighbor, PointFilter, PointId, QueryId, WorkerId};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Master {
    coordinator: Arc<Mutex<Coordinator>>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Master {
    /// Binds the worker listener and starts accepting connections.
    pub async fn bind(cfg: MasterConfig) -> Result<Self> {
        let listener = TcpListener::bind(cfg.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        let coordinator = Arc::new(Mutex::new(Coordinator::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            coordinator.clone(),
            cfg,
            shutdown_rx,
        ));
        info!(addr = %local_addr, "Master listening for workers");

        Ok(Self {
            coordinator,
            local_addr,
            shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Address workers should connect to. Resolves port 0 binds.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts a point and queues it for exactly one active worker.
    pub fn add_point(&self, point: DataPoint) -> Result<WorkerId> {
        self.coordinator.lock().route_point(point)
    }

    pub fn remove_point(&self, id: PointId) -> Result<bool> {
        self.coordinator.lock().remove_point(id)
    }

    pub fn submit_query(
        &self,
        target: DataPoint,
        metric: DistanceMetric,
        k: usize,
        filter: Option<PointFilter>,
    ) -> Result<QueryId> {
        self.coordinator.lock().submit(target, metric, k, filter)
    }

    /// `Ok(None)` until every expected worker has replied or been lost.
    pub fn get_query_results(&self, id: QueryId) -> Result<Option<Vec<Neighbor>>> {
        self.coordinator.lock().results(id)
    }

    pub fn query_report(&self, id: QueryId) -> Result<QueryReport> {
        self.coordinator.lock().report(id)
    }

    pub fn query_status(&self, id: QueryId) -> Result<QueryStatus> {
        self.coordinator.lock().status(id)
    }

    /// Polls until the query completes, it is abandoned, or `limit` passes.
    pub async fn wait_for_results(&self, id: QueryId, limit: Duration) -> Result<Vec<Neighbor>> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(results) = self.get_query_results(id)? {
                return Ok(results);
            }
            if Instant::now() >= deadline {
                return Err(MeshError::QueryTimedOut(id));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    pub fn forget_query(&self, id: QueryId) -> Result<()> {
        self.coordinator.lock().forget(id)
    }

    pub fn num_workers(&self) -> usize {
        self.coordinator.lock().num_workers()
    }

    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.coordinator.lock().workers()
    }

    pub fn num_points(&self) -> usize {
        self.coordinator.lock().num_points()
    }

    /// Waits until at least `n` workers are registered.
    pub async fn wait_for_workers(&self, n: usize, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while self.num_workers() < n {
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        self.coordinator.lock().is_shutting_down()
    }

    /// Abandons in-flight queries, tells every worker to stop, closes the
    /// listener and waits for all connection handlers. Safe to call twice.
    pub async fn shutdown(&self) {
        self.coordinator.lock().begin_shutdown();
        let _ = self.shutdown_tx.send(true);

        let accept_task = self.accept_task.lock().take();
        if let Some(task) = accept_task {
            if let Err(e) = task.await {
                warn!(error = %e, "Accept loop ended abnormally");
            }
            info!("Master stopped");
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    coordinator: Arc<Mutex<Coordinator>>,
    cfg: MasterConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Worker connection accepted");
                    handlers.spawn(connection::serve_worker(
                        stream,
                        peer,
                        coordinator.clone(),
                        cfg.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    sleep(POLL_INTERVAL).await;
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Worker handler panicked");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    drop(listener);
    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Worker handler panicked");
        }
    }
}
