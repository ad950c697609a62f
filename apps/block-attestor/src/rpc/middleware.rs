use tracing::{info, warn};
use warp::log::{Info, Log};

/// Request logging wrapper for the attestation routes.
///
/// Logs one line per request with:
/// - Signer identification
/// - Method and path
/// - Response status and duration (durationMs)
///
/// Server errors are logged at `warn`; the handler has already logged the
/// cause at `error` under the same fingerprint returned to the caller.
///
/// Fields in logs use *camelCase* convention for consistency.
pub fn request_logging(signer_name: &'static str) -> Log<impl Fn(Info<'_>) + Copy> {
    warp::log::custom(move |info: Info<'_>| {
        let duration_ms = u64::try_from(info.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = info.status();

        if status.is_server_error() {
            warn!(
                signer = signer_name,
                method = %info.method(),
                path = info.path(),
                status = status.as_u16(),
                durationMs = duration_ms,
                "request failed",
            );
        } else {
            info!(
                signer = signer_name,
                method = %info.method(),
                path = info.path(),
                status = status.as_u16(),
                durationMs = duration_ms,
                "request served",
            );
        }
    })
}
