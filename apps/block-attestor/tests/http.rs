use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_primitives::{address, keccak256, Address, Signature, B256};
use block_attestor::{
    attestation_payload::BlockAttestation,
    error_fingerprint,
    kms::local::LocalKms,
    mined::{CachedBlockHeight, MinedBlockGate, RateLimiter},
    rpc::{routes, AttestorService, CACHED_BLOCK_NUMBER_HEADER, CHAIN_ID_HEADER},
    signer::{kms::KmsSigner, Signer, SignerError},
    upstream::{BlockHeightSource, UpstreamError},
    AttestorError,
};
use ethereum_keys::{
    address::{address_from_public_key, address_hex},
    signature::from_rsv_bytes,
};
use k256::ecdsa::SigningKey;
use warp::http::{Response, StatusCode};

const CHAIN_ID: u64 = 1;
const UPSTREAM_FAILURE: &str = "connection refused";

#[derive(Clone, Default)]
struct StubUpstream {
    height: Arc<AtomicU64>,
    calls: Arc<AtomicUsize>,
    failing: bool,
}

impl StubUpstream {
    fn at(height: u64) -> Self {
        let upstream = Self::default();
        upstream.set_height(height);
        upstream
    }

    fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BlockHeightSource for StubUpstream {
    async fn latest_block_number(&self) -> Result<u64, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(UpstreamError::RetrievalError(UPSTREAM_FAILURE.to_string()));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }
}

type Service = AttestorService<StubUpstream, KmsSigner<LocalKms>>;

const UNRECOVERABLE_SIGNER: Address = address!("0x00000000000000000000000000000000000000aa");

/// Signer whose KMS signatures never recover to its own address
struct UnrecoverableSigner;

#[async_trait::async_trait]
impl Signer for UnrecoverableSigner {
    fn address(&self) -> Address {
        UNRECOVERABLE_SIGNER
    }

    async fn sign_hash(&self, _digest: B256) -> Result<Signature, SignerError> {
        Err(SignerError::RecoveryFailed {
            address: UNRECOVERABLE_SIGNER,
        })
    }
}

fn signing_key() -> SigningKey {
    SigningKey::from_slice(&[0x42; 32]).unwrap()
}

async fn service(upstream: StubUpstream, burst: u32) -> Arc<Service> {
    let signer = KmsSigner::new(LocalKms::new(signing_key()), "local".to_string(), CHAIN_ID)
        .await
        .unwrap();
    let gate = MinedBlockGate::new(
        upstream,
        Arc::new(CachedBlockHeight::new(0)),
        Arc::new(RateLimiter::new(
            Duration::from_secs(12),
            NonZeroU32::new(burst).unwrap(),
        )),
    );
    Arc::new(AttestorService::new(gate, "stub", signer, "local", CHAIN_ID))
}

async fn get(service: &Arc<Service>, path: &str) -> Response<Vec<u8>> {
    request(service, "GET", path).await
}

async fn request(service: &Arc<Service>, method: &str, path: &str) -> Response<Vec<u8>> {
    warp::test::request()
        .method(method)
        .path(path)
        .reply(&routes(Arc::clone(service)))
        .await
        .map(|body| body.to_vec())
}

fn body(response: &Response<Vec<u8>>) -> &str {
    std::str::from_utf8(response.body()).unwrap()
}

fn cached(response: &Response<Vec<u8>>) -> &str {
    response.headers()[CACHED_BLOCK_NUMBER_HEADER]
        .to_str()
        .unwrap()
}

fn recover(block_number: u64, response: &Response<Vec<u8>>) -> Address {
    let bytes = hex::decode(body(response)).unwrap();
    assert_eq!(bytes.len(), 65);
    let signature = from_rsv_bytes(&bytes).unwrap();
    let digest = keccak256(BlockAttestation::new(block_number, CHAIN_ID).signing_payload());
    signature.recover_address_from_prehash(&digest).unwrap()
}

#[tokio::test]
async fn signer_reports_kms_address() {
    let service = service(StubUpstream::default(), 4).await;

    let response = get(&service, "/signer").await;

    assert_eq!(response.status(), StatusCode::OK);
    let expected = address_from_public_key(&LocalKms::new(signing_key()).public_key());
    assert_eq!(body(&response), address_hex(&expected));
    assert_eq!(body(&response).len(), 40);
}

#[tokio::test]
async fn every_response_carries_chain_id_and_cors() {
    let service = service(StubUpstream::failing(), 4).await;

    for (method, path) in [
        ("GET", "/signer"),
        ("GET", "/abc"),
        ("POST", "/1"),
        ("GET", "/1"),
        ("GET", "/1/2"),
    ] {
        let response = request(&service, method, path).await;
        assert_eq!(response.headers()[CHAIN_ID_HEADER], "1", "{method} {path}");
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*",
            "{method} {path}"
        );
    }
}

#[tokio::test]
async fn invalid_block_numbers_are_rejected_without_upstream_calls() {
    let upstream = StubUpstream::at(1_000);
    let service = service(upstream.clone(), 4).await;

    for path in ["/-1", "/abc", "/0x10", "/18446744073709551616"] {
        let response = get(&service, path).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn write_methods_are_not_allowed() {
    let upstream = StubUpstream::at(1_000);
    let service = service(upstream.clone(), 4).await;

    for method in ["POST", "PUT", "DELETE"] {
        let response = request(&service, method, "/5").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");

        let response = request(&service, method, "/signer").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let service = service(StubUpstream::default(), 4).await;

    let response = get(&service, "/1/2").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn cached_heights_are_answered_without_upstream() {
    let upstream = StubUpstream::at(50);
    let service = service(upstream.clone(), 4).await;

    let first = get(&service, "/50").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cached(&first), "false");
    assert_eq!(upstream.calls(), 1);

    for block in [0, 10, 49, 50] {
        let response = get(&service, &format!("/{block}")).await;
        assert_eq!(response.status(), StatusCode::OK, "{block}");
        assert_eq!(cached(&response), "true", "{block}");
    }
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn limiter_denial_is_not_mined_without_upstream_call() {
    let upstream = StubUpstream::at(0);
    let service = service(upstream.clone(), 2).await;

    for block in [1, 2] {
        let response = get(&service, &format!("/{block}")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(cached(&response), "false");
    }

    let denied = get(&service, "/3").await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert_eq!(cached(&denied), "true");
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn attests_block_once_mined() {
    let upstream = StubUpstream::at(0);
    let service = service(upstream.clone(), 1).await;

    let not_mined = get(&service, "/100").await;
    assert_eq!(not_mined.status(), StatusCode::FORBIDDEN);

    upstream.set_height(100);
    let still_limited = get(&service, "/100").await;
    assert_eq!(still_limited.status(), StatusCode::FORBIDDEN);
    assert_eq!(cached(&still_limited), "true");

    tokio::time::advance(Duration::from_secs(12)).await;
    let mined = get(&service, "/100").await;
    assert_eq!(mined.status(), StatusCode::OK);
    assert_eq!(cached(&mined), "false");

    let signer = get(&service, "/signer").await;
    assert_eq!(address_hex(&recover(100, &mined)), body(&signer));
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_attestations_are_identical() {
    let service = service(StubUpstream::at(10), 4).await;

    let first = get(&service, "/5").await;
    let second = get(&service, "/5").await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.body(), second.body());
    assert!(!body(&first).starts_with("0x"));
}

#[tokio::test(start_paused = true)]
async fn head_is_a_read() {
    let service = service(StubUpstream::at(10), 4).await;

    let response = request(&service, "HEAD", "/5").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn upstream_failure_returns_fingerprint_only() {
    let upstream = StubUpstream::failing();
    let service = service(upstream.clone(), 4).await;

    let response = get(&service, "/7").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(cached(&response), "false");
    let message =
        AttestorError::from(UpstreamError::RetrievalError(UPSTREAM_FAILURE.to_string()))
            .to_string();
    assert_eq!(body(&response), error_fingerprint(&message));
    assert!(!body(&response).contains(UPSTREAM_FAILURE));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn signer_failure_returns_fingerprint_only() {
    let gate = MinedBlockGate::new(
        StubUpstream::at(10),
        Arc::new(CachedBlockHeight::new(0)),
        Arc::new(RateLimiter::new(
            Duration::from_secs(12),
            NonZeroU32::new(4).unwrap(),
        )),
    );
    let service = Arc::new(AttestorService::new(
        gate,
        "stub",
        UnrecoverableSigner,
        "unrecoverable",
        CHAIN_ID,
    ));

    let response = warp::test::request()
        .method("GET")
        .path("/5")
        .reply(&routes(service))
        .await
        .map(|body| body.to_vec());

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(cached(&response), "false");
    let message = AttestorError::from(SignerError::RecoveryFailed {
        address: UNRECOVERABLE_SIGNER,
    })
    .to_string();
    assert_eq!(body(&response), error_fingerprint(&message));
    assert!(!body(&response).contains("recover"));
    assert!(!body(&response).contains(&UNRECOVERABLE_SIGNER.to_string()));
}
