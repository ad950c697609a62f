use std::{convert::Infallible, sync::Arc};

use ethereum_keys::address::address_hex;
use tracing::{debug, field, info_span, Instrument, Span};
use warp::{
    http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode},
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use super::{request_logging, set_parent_from_headers};
use crate::{
    attestation::sign_block_attestation, error_fingerprint, mined::MinedBlockGate,
    signer::Signer, upstream::BlockHeightSource, AttestorError,
};

/// Chain id the attestor signs for, present on every response
pub const CHAIN_ID_HEADER: &str = "x-chain-id";
/// `"true"` when the mined check was answered without an upstream call
pub const CACHED_BLOCK_NUMBER_HEADER: &str = "x-cached-block-number";

/// Serves block attestations over HTTP
pub struct AttestorService<U, S> {
    gate: MinedBlockGate<U>,
    upstream_name: &'static str,
    signer: S,
    signer_name: &'static str,
    chain_id: u64,
}

impl<U, S> AttestorService<U, S>
where
    U: BlockHeightSource,
    S: Signer,
{
    /// Creates a new attestor service
    pub const fn new(
        gate: MinedBlockGate<U>,
        upstream_name: &'static str,
        signer: S,
        signer_name: &'static str,
        chain_id: u64,
    ) -> Self {
        Self {
            gate,
            upstream_name,
            signer,
            signer_name,
            chain_id,
        }
    }

    /// Returns the name of the upstream for logging purposes
    pub const fn upstream_name(&self) -> &'static str {
        self.upstream_name
    }

    /// Returns the name of the signer for logging purposes
    pub const fn signer_name(&self) -> &'static str {
        self.signer_name
    }

    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn signer_address(&self, method: Method) -> Response {
        if !is_read_method(&method) {
            return AttestorError::MethodNotAllowed(method).into_response();
        }
        reply::with_status(address_hex(&self.signer.address()), StatusCode::OK).into_response()
    }

    async fn attest(&self, segment: &str, method: Method) -> Response {
        let block_number = match parse_block_number(segment) {
            Ok(block_number) => block_number,
            Err(err) => return err.into_response(),
        };
        if !is_read_method(&method) {
            return AttestorError::MethodNotAllowed(method).into_response();
        }
        Span::current().record("blockNumber", block_number);

        let check = match self.gate.check(block_number).await {
            Ok(check) => check,
            Err(err) => return with_cached_header(AttestorError::from(err).into_response(), false),
        };

        let response = if check.mined {
            match sign_block_attestation(block_number, self.chain_id, &self.signer).await {
                Ok(signed) => {
                    reply::with_status(signed.signature_hex(), StatusCode::OK).into_response()
                }
                Err(err) => err.into_response(),
            }
        } else {
            debug!(
                cachedHeight = self.gate.cached_height(),
                "refusing to attest unmined block"
            );
            AttestorError::BlockNotMined(block_number).into_response()
        };

        with_cached_header(response, check.cached)
    }
}

/// Build the attestation routes:
/// - `/signer` answers with the signer address
/// - `/{blockNumber}` answers with a signed attestation once the block is mined
///
/// Every response carries the chain id and a permissive CORS header, and is
/// logged by [`request_logging`].
pub fn routes<U, S>(
    service: Arc<AttestorService<U, S>>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    U: BlockHeightSource,
    S: Signer,
{
    let chain_id = service.chain_id().to_string();
    let signer_name = service.signer_name();
    let with_service = warp::any().map(move || Arc::clone(&service));

    let signer = warp::path!("signer")
        .and(warp::method())
        .and(with_service.clone())
        .then(handle_signer::<U, S>);

    let attestation = warp::path::param::<String>()
        .and(warp::path::end())
        .and(warp::method())
        .and(warp::header::headers_cloned())
        .and(with_service)
        .then(handle_attestation::<U, S>);

    signer
        .or(attestation)
        .recover(handle_rejection)
        .with(reply::with::header(CHAIN_ID_HEADER, chain_id))
        .with(reply::with::header("access-control-allow-origin", "*"))
        .with(request_logging(signer_name))
}

async fn handle_signer<U, S>(method: Method, service: Arc<AttestorService<U, S>>) -> Response
where
    U: BlockHeightSource,
    S: Signer,
{
    service.signer_address(method)
}

async fn handle_attestation<U, S>(
    segment: String,
    method: Method,
    headers: HeaderMap,
    service: Arc<AttestorService<U, S>>,
) -> Response
where
    U: BlockHeightSource,
    S: Signer,
{
    let span = info_span!(
        "attestation",
        upstream = service.upstream_name(),
        signer = service.signer_name(),
        blockNumber = field::Empty,
    );
    set_parent_from_headers(&span, &headers);

    service.attest(&segment, method).instrument(span).await
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    if rejection.is_not_found() {
        return Ok(reply::with_status("not found", StatusCode::NOT_FOUND).into_response());
    }

    let fingerprint = error_fingerprint(&format!("{rejection:?}"));
    tracing::error!(fingerprint = %fingerprint, rejection = ?rejection, "unhandled rejection");
    Ok(reply::with_status(fingerprint, StatusCode::INTERNAL_SERVER_ERROR).into_response())
}

fn parse_block_number(segment: &str) -> Result<u64, AttestorError> {
    segment
        .parse::<u64>()
        .map_err(|source| AttestorError::InvalidBlockNumber {
            segment: segment.to_string(),
            source,
        })
}

fn is_read_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

fn with_cached_header(mut response: Response, cached: bool) -> Response {
    let value = if cached { "true" } else { "false" };
    response.headers_mut().insert(
        HeaderName::from_static(CACHED_BLOCK_NUMBER_HEADER),
        HeaderValue::from_static(value),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_block_numbers() {
        assert_eq!(parse_block_number("0").unwrap(), 0);
        assert_eq!(parse_block_number("18446744073709551615").unwrap(), u64::MAX);
    }

    #[test]
    fn rejects_negative_overflowing_and_non_numeric_segments() {
        for segment in ["-1", "abc", "0x10", "18446744073709551616", "1.5"] {
            let err = parse_block_number(segment).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{segment}");
        }
    }

    #[test]
    fn only_get_and_head_read() {
        assert!(is_read_method(&Method::GET));
        assert!(is_read_method(&Method::HEAD));
        assert!(!is_read_method(&Method::POST));
        assert!(!is_read_method(&Method::DELETE));
    }

    #[test]
    fn cached_header_values() {
        let response = with_cached_header(reply::reply().into_response(), true);
        assert_eq!(response.headers()[CACHED_BLOCK_NUMBER_HEADER], "true");

        let response = with_cached_header(reply::reply().into_response(), false);
        assert_eq!(response.headers()[CACHED_BLOCK_NUMBER_HEADER], "false");
    }
}
