use thiserror::Error;

mod attestor;
pub mod health_server;
mod interceptor;
mod middleware;
pub mod server;

pub use attestor::{routes, AttestorService, CACHED_BLOCK_NUMBER_HEADER, CHAIN_ID_HEADER};
pub use interceptor::set_parent_from_headers;
pub use middleware::request_logging;

/// Errors raised by the HTTP servers themselves, as opposed to per-request
/// failures which are answered with a status code.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("shutdown channel closed before a shutdown signal was sent")]
    ShutdownChannelClosed,
}
