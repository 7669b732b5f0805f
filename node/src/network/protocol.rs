use knnmesh_kernel::{DataPoint, Neighbor, PointId, Query, QueryId, WorkerId};
use serde::{Deserialize, Serialize};

/// Bumped whenever a `WireMessage` variant changes shape.
pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireMessage {
    /// First frame a worker sends after connecting.
    Register { protocol_version: u16 },
    RegisterAck { worker_id: WorkerId, protocol_version: u16 },
    /// Sent instead of `RegisterAck`; the master closes the connection after.
    Reject { reason: String },
    AddPoint { point: DataPoint },
    RemovePoint { id: PointId },
    FindKNearest { query: Query },
    QueryReply {
        query_id: QueryId,
        neighbors: Vec<Neighbor>,
        /// Points skipped for dimension mismatch.
        skipped: u32,
    },
    Shutdown,
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Register { .. } => "register",
            WireMessage::RegisterAck { .. } => "register_ack",
            WireMessage::Reject { .. } => "reject",
            WireMessage::AddPoint { .. } => "add_point",
            WireMessage::RemovePoint { .. } => "remove_point",
            WireMessage::FindKNearest { .. } => "find_k_nearest",
            WireMessage::QueryReply { .. } => "query_reply",
            WireMessage::Shutdown => "shutdown",
        }
    }
}
