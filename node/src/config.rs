use std::net::SocketAddr;
use std::time::Duration;

/// Largest frame accepted on the worker protocol (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Address workers connect to.
    pub listen_addr: SocketAddr,
    /// Client-facing HTTP API. Disabled when `None`.
    pub http_addr: Option<SocketAddr>,
    /// How long a new connection may take to send `Register`.
    pub handshake_timeout: Duration,
    pub max_frame_len: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9876)),
            http_addr: Some(SocketAddr::from(([127, 0, 0, 1], 3000))),
            handshake_timeout: Duration::from_secs(5),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Master's worker-protocol address, `host:port`.
    pub master_addr: String,
    pub connect_timeout: Duration,
    /// How long to wait for `RegisterAck`.
    pub handshake_timeout: Duration,
    pub max_frame_len: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            master_addr: "127.0.0.1:9876".to_string(),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl WorkerConfig {
    pub fn new(master_addr: impl Into<String>) -> Self {
        Self {
            master_addr: master_addr.into(),
            ..Default::default()
        }
    }
}
