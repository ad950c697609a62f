use std::num::ParseIntError;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::error;
use warp::{
    http::{Method, StatusCode},
    reply::{self, Reply, Response},
};

use crate::signer::SignerError;
use crate::upstream::UpstreamError;

/// Errors that can occur while serving attestations
#[derive(Debug, Error)]
pub enum AttestorError {
    #[error("invalid block number `{segment}`: {source}")]
    InvalidBlockNumber {
        segment: String,
        #[source]
        source: ParseIntError,
    },

    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("block {0} is not yet mined")]
    BlockNotMined(u64),

    #[error("Failed to sign attestation due to: {0}")]
    SignerError(#[from] SignerError),

    #[error("UpstreamError: {0}")]
    UpstreamError(#[from] UpstreamError),
}

impl AttestorError {
    /// HTTP status for this error.
    ///
    /// 403 is reserved for blocks that are not mined yet; every other client
    /// mistake is a 400 or 405.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBlockNumber { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BlockNotMined(_) => StatusCode::FORBIDDEN,
            Self::SignerError(_) | Self::UpstreamError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Short content hash of an error message, used to correlate a 500 response
/// with its log line without exposing the message.
pub fn error_fingerprint(message: &str) -> String {
    hex::encode(&Sha256::digest(message.as_bytes())[..4])
}

impl Reply for AttestorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if self.is_internal() {
            let message = self.to_string();
            let fingerprint = error_fingerprint(&message);
            error!(fingerprint = %fingerprint, error = %message, "internal error while serving request");
            fingerprint
        } else {
            self.to_string()
        };

        reply::with_status(body, status).into_response()
    }
}
