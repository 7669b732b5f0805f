// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Master side of one worker connection.

use crate::config::MasterConfig;
use crate::errors::MeshError;
use crate::master::coordinator::Coordinator;
use crate::network::codec::MessageCodec;
use crate::network::protocol::{WireMessage, PROTOCOL_VERSION};
use futures::{SinkExt, StreamExt};
use knnmesh_kernel::WorkerId;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

type WorkerLink = Framed<TcpStream, MessageCodec>;

/// Upper bound on flushing queued frames once the reader has stopped.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs one worker connection to completion: handshake, then a reader loop
/// and a writer task until either side fails or shutdown is signalled.
/// Whatever ends the connection, the worker is reported lost exactly once.
pub(crate) async fn serve_worker(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: Arc<Mutex<Coordinator>>,
    cfg: MasterConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "set_nodelay failed");
    }
    let mut link = Framed::new(stream, MessageCodec::new(cfg.max_frame_len));

    let (worker_id, mut rx) = match handshake(&mut link, peer, &coordinator, &cfg, &mut shutdown).await {
        Ok(registered) => registered,
        Err(e) => {
            warn!(%peer, error = %e, "Worker handshake failed");
            return;
        }
    };

    let (mut sink, mut frames) = link.split();

    // Frames leave in queue order; `Shutdown` is the last one sent.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let last = matches!(msg, WireMessage::Shutdown);
            if let Err(e) = sink.send(msg).await {
                debug!(worker = %worker_id, error = %e, "Write failed");
                return;
            }
            if last {
                break;
            }
        }
        let _ = sink.close().await;
    });
    let mut writer_done = false;

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(WireMessage::QueryReply { query_id, neighbors, skipped })) => {
                    let outcome = coordinator.lock().on_reply(worker_id, query_id, neighbors, skipped);
                    if let Err(e) = outcome {
                        warn!(worker = %worker_id, query = %query_id, error = %e, "Reply rejected");
                    }
                }
                Some(Ok(other)) => {
                    warn!(worker = %worker_id, kind = other.kind(), "Unexpected message from worker");
                }
                Some(Err(e)) => {
                    warn!(worker = %worker_id, error = %e, "Worker connection failed");
                    break;
                }
                None => {
                    info!(worker = %worker_id, "Worker closed the connection");
                    break;
                }
            },
            _ = &mut writer => {
                writer_done = true;
                let err = MeshError::WorkerDisconnected(worker_id);
                debug!(error = %err, "Outbound link closed");
                break;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    // Drops the outbound sender, which lets the writer finish.
    coordinator.lock().worker_lost(worker_id);
    drop(frames);

    if !writer_done && timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
}

async fn handshake(
    link: &mut WorkerLink,
    peer: SocketAddr,
    coordinator: &Mutex<Coordinator>,
    cfg: &MasterConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(WorkerId, UnboundedReceiver<WireMessage>), MeshError> {
    if *shutdown.borrow() {
        reject(link, "master is shutting down").await;
        return Err(MeshError::ShuttingDown);
    }

    let first = tokio::select! {
        first = timeout(cfg.handshake_timeout, link.next()) => first,
        _ = shutdown.changed() => return Err(MeshError::ShuttingDown),
    };

    match first {
        Err(_) => return Err(MeshError::Handshake("timed out waiting for register".to_string())),
        Ok(None) => return Err(MeshError::Handshake("closed before register".to_string())),
        Ok(Some(Err(e))) => return Err(e),
        Ok(Some(Ok(WireMessage::Register { protocol_version }))) if protocol_version == PROTOCOL_VERSION => {}
        Ok(Some(Ok(WireMessage::Register { protocol_version }))) => {
            let reason = format!(
                "protocol version {} not supported, master speaks {}",
                protocol_version, PROTOCOL_VERSION
            );
            reject(link, &reason).await;
            return Err(MeshError::Handshake(reason));
        }
        Ok(Some(Ok(other))) => {
            let reason = format!("expected register, got {}", other.kind());
            reject(link, &reason).await;
            return Err(MeshError::Protocol(reason));
        }
    }

    let (tx, rx) = unbounded_channel();
    let registered = coordinator.lock().register(peer, tx);
    let worker_id = match registered {
        Ok(id) => id,
        Err(e) => {
            reject(link, &e.to_string()).await;
            return Err(e);
        }
    };

    // Anything routed to this worker in the meantime waits in `rx` and is
    // written after the ack.
    let ack = WireMessage::RegisterAck { worker_id, protocol_version: PROTOCOL_VERSION };
    if let Err(e) = link.send(ack).await {
        coordinator.lock().worker_lost(worker_id);
        return Err(e);
    }
    Ok((worker_id, rx))
}

async fn reject(link: &mut WorkerLink, reason: &str) {
    let _ = link.send(WireMessage::Reject { reason: reason.to_string() }).await;
    let _ = link.close().await;
}
