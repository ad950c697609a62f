use std::net::SocketAddr;

use tokio::sync::broadcast;
use tracing::{debug, info};
use warp::{http::StatusCode, Filter};

use super::RpcError;

/// `GET /health` answering `SERVING` while the process is up
pub fn health_route() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone
{
    warp::path!("health").and(warp::get()).map(|| {
        debug!("health check request received");
        // If we're responding, we're healthy
        warp::reply::with_status("SERVING", StatusCode::OK)
    })
}

/// Start the health check server.
///
/// This server runs independently of the attestation server and provides
/// health check endpoints for Kubernetes readiness/liveness probes.
#[tracing::instrument(skip_all, fields(health_addr = %health_addr))]
pub async fn start(
    health_addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), RpcError> {
    info!(healthAddr = %health_addr, "health check server ready, listening for requests");

    tokio::select! {
        _ = warp::serve(health_route()).run(health_addr) => {
            info!("health check server stopped");
            Ok(())
        }
        received = shutdown_rx.recv() => {
            info!("health check server received shutdown signal");
            received.map_err(|_| RpcError::ShutdownChannelClosed)
        }
    }
}
