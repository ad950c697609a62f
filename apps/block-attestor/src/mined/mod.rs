//! Mined-block check backed by a cached high-water mark.
//!
//! The upstream node is only asked for its latest height when the cache
//! cannot answer and the shared limiter grants a token. A denied token is
//! answered as "not mined" without contacting upstream; callers retry later.

use std::sync::Arc;

use tracing::debug;

use crate::upstream::{BlockHeightSource, UpstreamError};

mod cache;
mod rate_limiter;

pub use cache::CachedBlockHeight;
pub use rate_limiter::RateLimiter;

/// Outcome of a mined check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinedCheck {
    /// The requested block is at or below a height seen upstream
    pub mined: bool,
    /// The decision was made without an upstream call
    pub cached: bool,
}

/// Decides whether a block number has been mined
///
/// Cache and limiter are constructed by the caller and shared by every
/// request; both are lock-free.
pub struct MinedBlockGate<U> {
    upstream: U,
    cache: Arc<CachedBlockHeight>,
    limiter: Arc<RateLimiter>,
}

impl<U: BlockHeightSource> MinedBlockGate<U> {
    pub const fn new(upstream: U, cache: Arc<CachedBlockHeight>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            upstream,
            cache,
            limiter,
        }
    }

    /// Highest block number currently known to be mined
    pub fn cached_height(&self) -> u64 {
        self.cache.load()
    }

    pub async fn check(&self, requested: u64) -> Result<MinedCheck, UpstreamError> {
        let observed = self.cache.load();
        if observed >= requested {
            return Ok(MinedCheck {
                mined: true,
                cached: true,
            });
        }

        if !self.limiter.try_acquire() {
            debug!(
                requestedHeight = requested,
                cachedHeight = observed,
                "upstream refresh rate limited, treating block as not mined"
            );
            return Ok(MinedCheck {
                mined: false,
                cached: true,
            });
        }

        let latest = self.upstream.latest_block_number().await?;
        if self.cache.advance(observed, latest) {
            debug!(
                previousHeight = observed,
                cachedHeight = latest,
                "advanced cached block height"
            );
        }

        Ok(MinedCheck {
            mined: latest >= requested,
            cached: false,
        })
    }
}
