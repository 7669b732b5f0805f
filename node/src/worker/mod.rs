// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Worker runtime: holds one shard and answers scans for the master.

pub mod shard;

pub use shard::Shard;

use crate::config::WorkerConfig;
use crate::errors::Result;
use crate::network::client::{MasterClient, MasterLink};
use crate::network::protocol::WireMessage;
use futures::{SinkExt, StreamExt};
use knnmesh_kernel::index::brute_force::BruteForceScan;
use knnmesh_kernel::{Query, WorkerId};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct Worker {
    worker_id: WorkerId,
    shard: Arc<Shard>,
    link: MasterLink,
}

impl Worker {
    /// Connects to the master and completes registration.
    pub async fn connect(cfg: &WorkerConfig) -> Result<Self> {
        let client = MasterClient::connect(cfg).await?;
        let worker_id = client.worker_id();
        info!(worker = %worker_id, master = %cfg.master_addr, "Registered with master");
        Ok(Self {
            worker_id,
            shard: Arc::new(Shard::new()),
            link: client.into_link(),
        })
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn shard(&self) -> Arc<Shard> {
        self.shard.clone()
    }

    /// Serves master messages in arrival order until `Shutdown` or the
    /// connection closes. Replies for scans already started are flushed
    /// before returning.
    pub async fn run(self) -> Result<()> {
        let Worker { worker_id, shard, link } = self;
        let (mut sink, mut frames) = link.split();
        let (tx, mut rx) = unbounded_channel::<WireMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    return Err(e);
                }
            }
            sink.close().await
        });

        let mut scans = JoinSet::new();
        let mut outcome = Ok(());

        while let Some(frame) = frames.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(worker = %worker_id, error = %e, "Connection to master failed");
                    outcome = Err(e);
                    break;
                }
            };

            match msg {
                WireMessage::AddPoint { point } => {
                    let id = point.id();
                    if shard.insert(point) {
                        debug!(worker = %worker_id, point = %id, "Point overwritten");
                    }
                }
                WireMessage::RemovePoint { id } => {
                    shard.remove(id);
                }
                WireMessage::FindKNearest { query } => {
                    scans.spawn(scan(shard.clone(), query, tx.clone()));
                }
                WireMessage::Shutdown => {
                    info!(worker = %worker_id, "Shutdown requested by master");
                    break;
                }
                other => {
                    warn!(worker = %worker_id, kind = other.kind(), "Unexpected message from master");
                }
            }
        }

        while scans.join_next().await.is_some() {}
        drop(tx);

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(worker = %worker_id, error = %e, "Writer stopped"),
            Err(e) => warn!(worker = %worker_id, error = %e, "Writer task failed"),
        }
        info!(worker = %worker_id, points = shard.len(), "Worker stopped");
        outcome
    }
}

/// Runs one scan off the async threads and queues the reply. The master
/// always gets a reply, empty if the scan itself failed.
async fn scan(shard: Arc<Shard>, query: Query, tx: UnboundedSender<WireMessage>) {
    let query_id = query.id();
    let scanned = tokio::task::spawn_blocking(move || {
        let points = shard.snapshot();
        BruteForceScan.search(&query, points.iter().map(|p| p.as_ref()))
    })
    .await;

    let reply = match scanned {
        Ok(outcome) => {
            if outcome.skipped > 0 {
                warn!(query = %query_id, skipped = outcome.skipped, "Points skipped for dimension mismatch");
            }
            debug!(query = %query_id, scanned = outcome.scanned, found = outcome.results.len(), "Scan finished");
            WireMessage::QueryReply {
                query_id,
                neighbors: outcome.results.into_neighbors(),
                skipped: u32::try_from(outcome.skipped).unwrap_or(u32::MAX),
            }
        }
        Err(e) => {
            warn!(query = %query_id, error = %e, "Scan task failed");
            WireMessage::QueryReply { query_id, neighbors: Vec::new(), skipped: 0 }
        }
    };
    let _ = tx.send(reply);
}
