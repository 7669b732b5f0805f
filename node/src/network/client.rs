use crate::config::WorkerConfig;
use crate::errors::MeshError;
use crate::network::codec::MessageCodec;
use crate::network::protocol::{WireMessage, PROTOCOL_VERSION};
use futures::{SinkExt, StreamExt};
use knnmesh_kernel::WorkerId;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

pub type MasterLink = Framed<TcpStream, MessageCodec>;

/// Worker-side connection to the master, after a successful handshake.
#[derive(Debug)]
pub struct MasterClient {
    worker_id: WorkerId,
    link: MasterLink,
}

impl MasterClient {
    /// Connects and registers. Both steps are bounded by the configured
    /// timeouts.
    pub async fn connect(cfg: &WorkerConfig) -> Result<Self, MeshError> {
        let stream = timeout(cfg.connect_timeout, TcpStream::connect(cfg.master_addr.as_str()))
            .await
            .map_err(|_| MeshError::Handshake(format!("connect to {} timed out", cfg.master_addr)))??;
        stream.set_nodelay(true)?;

        let mut link = Framed::new(stream, MessageCodec::new(cfg.max_frame_len));
        link.send(WireMessage::Register { protocol_version: PROTOCOL_VERSION }).await?;

        let reply = timeout(cfg.handshake_timeout, link.next())
            .await
            .map_err(|_| MeshError::Handshake("no RegisterAck from master".to_string()))?;

        match reply {
            Some(Ok(WireMessage::RegisterAck { worker_id, protocol_version })) => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(MeshError::Handshake(format!(
                        "master speaks protocol {}, worker speaks {}",
                        protocol_version, PROTOCOL_VERSION
                    )));
                }
                Ok(Self { worker_id, link })
            }
            Some(Ok(WireMessage::Reject { reason })) => Err(MeshError::Handshake(reason)),
            Some(Ok(other)) => Err(MeshError::Protocol(format!(
                "expected register_ack, got {}",
                other.kind()
            ))),
            Some(Err(e)) => Err(e),
            None => Err(MeshError::Handshake("master closed the connection".to_string())),
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn into_link(self) -> MasterLink {
        self.link
    }
}
