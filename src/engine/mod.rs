use std::sync::Arc;

use crate::cache::{CachingProvider, RuleSetProvider};
use crate::config::OnMissingRuleSetStrategy;
use crate::error::FluxgateError;
use crate::limiter::RateLimiter;
use crate::model::{RequestContext, Verdict};

/// Concrete engine type used by server wiring: a boxed provider behind the
/// cache, so `main`/`bootstrap` never need to name a provider type.
pub type DynEngine = Engine<Arc<dyn RuleSetProvider>>;

/// Top-level entry point (spec.md §4.7): resolves a rule-set id through the
/// cache, then hands off to the rate limiter. The single place that decides
/// what a missing rule-set means.
pub struct Engine<P: RuleSetProvider> {
    provider: CachingProvider<P>,
    limiter: RateLimiter,
    on_missing_rule_set: OnMissingRuleSetStrategy,
}

impl<P: RuleSetProvider> Engine<P> {
    pub fn new(provider: CachingProvider<P>, limiter: RateLimiter, on_missing_rule_set: OnMissingRuleSetStrategy) -> Self {
        Self {
            provider,
            limiter,
            on_missing_rule_set,
        }
    }

    /// Checks one permit against `rule_set_id`. See [`Self::check_n`] for
    /// multi-permit callers (e.g. a batch of queued jobs).
    pub async fn check(&self, rule_set_id: &str, context: &RequestContext) -> Result<Verdict, FluxgateError> {
        self.check_n(rule_set_id, context, 1).await
    }

    pub async fn check_n(&self, rule_set_id: &str, context: &RequestContext, permits: u64) -> Result<Verdict, FluxgateError> {
        match self.provider.find_by_id(rule_set_id).await {
            Some(rule_set) => self.limiter.check(&rule_set, context, permits).await,
            None => match self.on_missing_rule_set {
                OnMissingRuleSetStrategy::Throw => Err(FluxgateError::MissingRuleSet(rule_set_id.to_string())),
                OnMissingRuleSetStrategy::Allow => Ok(Verdict::allowed_no_rule()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{StaticRuleSetProvider, TtlRuleCache};
    use crate::model::rule::RuleBuilder;
    use crate::model::{Band, RuleSet, Scope};
    use crate::resilience::ResilienceEnvelope;
    use crate::store::{BandSpec, BucketState, TokenBucketStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct AllowAllStore;

    #[async_trait]
    impl TokenBucketStore for AllowAllStore {
        async fn try_consume_bands(&self, specs: &[BandSpec<'_>], _permits: u64) -> Result<Vec<BucketState>, FluxgateError> {
            Ok(specs
                .iter()
                .map(|s| BucketState {
                    consumed: true,
                    remaining_tokens: s.band.capacity() - 1,
                    nanos_to_wait_for_refill: 0,
                    reset_time_nanos: 0,
                })
                .collect())
        }
    }

    fn engine(strategy: OnMissingRuleSetStrategy) -> Engine<StaticRuleSetProvider> {
        let provider = StaticRuleSetProvider::new();
        let rule = RuleBuilder::new("r1", "rs1", Scope::Global)
            .band(Band::new(Duration::from_secs(1), 10, None).unwrap())
            .build()
            .unwrap();
        provider.upsert(RuleSet::new("rs1", vec![rule]));

        let cache = Arc::new(TtlRuleCache::new(Duration::from_secs(60), 100));
        let caching = CachingProvider::new(provider, cache);
        let envelope = Arc::new(ResilienceEnvelope::new(
            Arc::new(AllowAllStore),
            &crate::config::RetryConfig::default(),
            &crate::config::CircuitBreakerConfig::default(),
            5_000,
        ));
        Engine::new(caching, RateLimiter::new(envelope), strategy)
    }

    #[tokio::test]
    async fn checks_an_existing_rule_set() {
        let e = engine(OnMissingRuleSetStrategy::Throw);
        let ctx = RequestContext::new("1.2.3.4", "/x", "GET");
        let verdict = e.check("rs1", &ctx).await.unwrap();
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn missing_rule_set_throws_by_default() {
        let e = engine(OnMissingRuleSetStrategy::Throw);
        let ctx = RequestContext::new("1.2.3.4", "/x", "GET");
        let err = e.check("missing", &ctx).await.unwrap_err();
        assert!(matches!(err, FluxgateError::MissingRuleSet(_)));
    }

    #[tokio::test]
    async fn missing_rule_set_allows_when_configured() {
        let e = engine(OnMissingRuleSetStrategy::Allow);
        let ctx = RequestContext::new("1.2.3.4", "/x", "GET");
        let verdict = e.check("missing", &ctx).await.unwrap();
        assert!(verdict.allowed);
        assert!(verdict.matched_rule.is_none());
    }
}
