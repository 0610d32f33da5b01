//! Log sink - receives write-log calls over gRPC and framed TCP RPC.
//!
//! Both servers write through the same store. Persistence beyond the
//! process is an external collaborator; this binary keeps entries in
//! memory and logs each write.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use switchboard::config::SwitchboardConfig;
use switchboard::sink::MemoryStore;
use switchboard::transport::{grpc, rpc};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let config = match SwitchboardConfig::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "failed to load config, using defaults");
            SwitchboardConfig::default()
        }
    };

    let store = Arc::new(MemoryStore::new());

    let rpc_addr = format!("0.0.0.0:{}", config.logsink.rpc_port);
    let rpc_listener = TcpListener::bind(&rpc_addr)
        .await
        .expect("failed to bind RPC listener");
    info!(addr = %rpc_addr, "RPC server listening");

    let rpc_store = Arc::clone(&store);
    tokio::spawn(async move {
        if let Err(err) = rpc::serve(rpc_listener, rpc_store).await {
            error!(error = %err, "RPC server stopped");
        }
    });

    let grpc_addr: SocketAddr = format!("0.0.0.0:{}", config.logsink.grpc_port)
        .parse()
        .expect("invalid gRPC address");
    info!(addr = %grpc_addr, "gRPC server listening");

    if let Err(err) = grpc::serve_grpc(store, grpc_addr).await {
        error!(error = %err, "gRPC server stopped");
        std::process::exit(1);
    }
}
