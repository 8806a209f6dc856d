pub mod redis_store;

pub use redis_store::RedisTokenBucketStore;

use async_trait::async_trait;

use crate::error::FluxgateError;
use crate::model::Band;

/// Transient result of one consume attempt (spec.md §3). `nanos_to_wait_for_refill`
/// is `0` when `consumed == true`.
#[derive(Clone, Copy, Debug)]
pub struct BucketState {
    pub consumed: bool,
    pub remaining_tokens: u64,
    pub nanos_to_wait_for_refill: u64,
    pub reset_time_nanos: u64,
}

/// One band's identity for a single atomic multi-band consume call.
pub struct BandSpec<'a> {
    pub bucket_key: String,
    pub band: &'a Band,
}

/// Atomic multi-band consumption against a shared, external store, executed
/// via a server-side script to eliminate clock skew and races (spec.md §4.3).
///
/// Implementations must preserve the four correctness properties in
/// spec.md §4.3: clock as source of truth, integer-only arithmetic, read-only
/// rejection, and TTL safety.
#[async_trait]
pub trait TokenBucketStore: Send + Sync {
    /// Atomic consume against a single `(bucketKey, band)`.
    async fn try_consume(
        &self,
        bucket_key: &str,
        band: &Band,
        permits: u64,
    ) -> Result<BucketState, FluxgateError> {
        let spec = BandSpec {
            bucket_key: bucket_key.to_string(),
            band,
        };
        let mut states = self.try_consume_bands(std::slice::from_ref(&spec), permits).await?;
        Ok(states.remove(0))
    }

    /// Atomic all-or-nothing consume across every band of a rule in one
    /// server-side execution (spec.md §4.4 step 4). Must not debit any band
    /// unless every band allows.
    async fn try_consume_bands(
        &self,
        specs: &[BandSpec<'_>],
        permits: u64,
    ) -> Result<Vec<BucketState>, FluxgateError>;
}

pub(crate) fn validate_permits(permits: u64) -> Result<(), FluxgateError> {
    if permits == 0 {
        return Err(FluxgateError::Config("permits must be >= 1".to_string()));
    }
    Ok(())
}
