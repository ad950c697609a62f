use std::sync::atomic::{AtomicU64, Ordering};

/// Highest block number known to be mined
///
/// Only ever moves upward, and only through compare-and-swap from a value a
/// caller previously observed. A lost race just means another request already
/// advanced the height.
#[derive(Debug, Default)]
pub struct CachedBlockHeight(AtomicU64);

impl CachedBlockHeight {
    pub const fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Swap `observed` for `fetched` if nobody moved the height in between.
    ///
    /// Returns true if this call advanced the cache. A `fetched` height at or
    /// below `observed` is ignored so the cache never rolls back.
    pub fn advance(&self, observed: u64, fetched: u64) -> bool {
        if fetched <= observed {
            return false;
        }
        self.0
            .compare_exchange(observed, fetched, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
