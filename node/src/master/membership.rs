// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Worker membership registry.

use crate::network::protocol::WireMessage;
use knnmesh_kernel::WorkerId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::sync::mpsc::UnboundedSender;

/// Ordered outbound queue feeding one worker's writer task.
pub type Outbound = UnboundedSender<WireMessage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Active,
    Disconnected,
}

#[derive(Debug)]
pub struct WorkerEntry {
    pub id: WorkerId,
    pub peer: SocketAddr,
    pub state: WorkerState,
    pub points_routed: u64,
    outbound: Outbound,
}

impl WorkerEntry {
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }
}

/// Public view of one registered worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub peer: SocketAddr,
    pub state: WorkerState,
    pub points_routed: u64,
}

/// Active workers keyed by id. Iteration is in id order, which keeps the
/// round-robin rotation stable while workers come and go.
#[derive(Debug, Default)]
pub struct Registry {
    workers: BTreeMap<WorkerId, WorkerEntry>,
    last_id: WorkerId,
    cursor: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new active worker. Ids start at 1 and are never reused.
    pub fn register(&mut self, peer: SocketAddr, outbound: Outbound) -> WorkerId {
        self.last_id = self.last_id.next();
        let id = self.last_id;
        self.workers.insert(
            id,
            WorkerEntry {
                id,
                peer,
                state: WorkerState::Active,
                points_routed: 0,
                outbound,
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn is_active(&self, id: WorkerId) -> bool {
        self.workers
            .get(&id)
            .map_or(false, |w| w.state == WorkerState::Active)
    }

    pub fn active_ids(&self) -> Vec<WorkerId> {
        self.workers
            .values()
            .filter(|w| w.state == WorkerState::Active)
            .map(|w| w.id)
            .collect()
    }

    /// Next worker in rotation, or `None` when nobody is registered.
    pub fn next_round_robin(&mut self) -> Option<WorkerId> {
        if self.workers.is_empty() {
            return None;
        }
        let idx = self.cursor % self.workers.len();
        self.cursor = self.cursor.wrapping_add(1);
        self.workers.keys().nth(idx).copied()
    }

    /// Queues `msg` for a worker. Hands the message back if the worker is
    /// gone or its writer has stopped.
    pub fn send(&self, id: WorkerId, msg: WireMessage) -> Result<(), WireMessage> {
        match self.workers.get(&id) {
            Some(w) if w.state == WorkerState::Active => w.outbound.send(msg).map_err(|e| e.0),
            _ => Err(msg),
        }
    }

    pub fn note_routed(&mut self, id: WorkerId) {
        if let Some(w) = self.workers.get_mut(&id) {
            w.points_routed += 1;
        }
    }

    /// Flips a worker to `Disconnected` and purges it. Dropping the returned
    /// entry closes its outbound queue.
    pub fn disconnect(&mut self, id: WorkerId) -> Option<WorkerEntry> {
        let mut entry = self.workers.remove(&id)?;
        entry.state = WorkerState::Disconnected;
        Some(entry)
    }

    /// Removes every worker, for shutdown.
    pub fn drain(&mut self) -> Vec<WorkerEntry> {
        std::mem::take(&mut self.workers).into_values().collect()
    }

    pub fn infos(&self) -> Vec<WorkerInfo> {
        self.workers
            .values()
            .map(|w| WorkerInfo {
                id: w.id,
                peer: w.peer,
                state: w.state,
                points_routed: w.points_routed,
            })
            .collect()
    }
}
