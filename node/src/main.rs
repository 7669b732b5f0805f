// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use knnmesh_node::config::{MasterConfig, WorkerConfig};
use knnmesh_node::errors::MeshError;
use knnmesh_node::master::Master;
use knnmesh_node::server::serve_http;
use knnmesh_node::telemetry::init_telemetry;
use knnmesh_node::worker::Worker;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Parser)]
#[command(name = "knnmesh-node")]
#[command(about = "Distributed k-nearest-neighbor search: master and worker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept workers and serve the client API
    Master {
        /// Address workers connect to
        #[arg(long, env = "KNNMESH_LISTEN", default_value = "127.0.0.1:9876")]
        listen: SocketAddr,

        /// HTTP client API address
        #[arg(long, env = "KNNMESH_HTTP", default_value = "127.0.0.1:3000")]
        http: SocketAddr,

        /// Disable the HTTP API
        #[arg(long, env = "KNNMESH_NO_HTTP")]
        no_http: bool,

        /// Seconds a new connection has to register
        #[arg(long, env = "KNNMESH_HANDSHAKE_TIMEOUT", default_value_t = 5)]
        handshake_timeout: u64,
    },
    /// Hold a shard and answer scans for a master
    Worker {
        /// Master address, host:port
        #[arg(long, env = "KNNMESH_MASTER", default_value = "127.0.0.1:9876")]
        master: String,

        /// Seconds to wait for the TCP connection
        #[arg(long, env = "KNNMESH_CONNECT_TIMEOUT", default_value_t = 5)]
        connect_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), MeshError> {
    init_telemetry();
    let cli = Cli::parse();

    match cli.command {
        Commands::Master { listen, http, no_http, handshake_timeout } => {
            let cfg = MasterConfig {
                listen_addr: listen,
                http_addr: (!no_http).then_some(http),
                handshake_timeout: Duration::from_secs(handshake_timeout),
                ..MasterConfig::default()
            };
            run_master(cfg).await
        }
        Commands::Worker { master, connect_timeout } => {
            let cfg = WorkerConfig {
                connect_timeout: Duration::from_secs(connect_timeout),
                ..WorkerConfig::new(master)
            };
            run_worker(cfg).await
        }
    }
}

async fn run_master(cfg: MasterConfig) -> Result<(), MeshError> {
    tracing::info!("Starting master with config: {:?}", cfg);
    let master = Arc::new(Master::bind(cfg.clone()).await?);

    let (stop_http, http_stopped) = oneshot::channel::<()>();
    let http = cfg.http_addr.map(|addr| {
        let master = master.clone();
        tokio::spawn(async move {
            let signal = async {
                let _ = http_stopped.await;
            };
            if let Err(e) = serve_http(addr, master, signal).await {
                tracing::error!("HTTP API failed: {}", e);
            }
        })
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
    tracing::info!("Ctrl-C received, shutting down");

    master.shutdown().await;
    let _ = stop_http.send(());
    if let Some(task) = http {
        let _ = task.await;
    }
    Ok(())
}

async fn run_worker(cfg: WorkerConfig) -> Result<(), MeshError> {
    let worker = Worker::connect(&cfg).await?;
    tokio::select! {
        res = worker.run() => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received, worker exiting");
            Ok(())
        }
    }
}
