use std::{net::SocketAddr, sync::Arc};

use tokio::sync::broadcast;
use tracing::info;

use super::{routes, AttestorService, RpcError};
use crate::{signer::Signer, upstream::BlockHeightSource};

/// Start the HTTP attestation server.
///
/// Runs until a message (or a closed channel) arrives on `shutdown_rx`.
#[tracing::instrument(
    skip_all,
    fields(listen_addr = %listen_addr, upstream = service.upstream_name(), signer = service.signer_name())
)]
pub async fn start<U, S>(
    listen_addr: SocketAddr,
    service: Arc<AttestorService<U, S>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), RpcError>
where
    U: BlockHeightSource,
    S: Signer,
{
    info!(
        listenAddr = %listen_addr,
        chainId = service.chain_id(),
        "HTTP server ready, listening for requests"
    );

    tokio::select! {
        _ = warp::serve(routes(service)).run(listen_addr) => {
            info!("HTTP server stopped");
            Ok(())
        }
        received = shutdown_rx.recv() => {
            info!("HTTP server received shutdown signal");
            received.map_err(|_| RpcError::ShutdownChannelClosed)
        }
    }
}
