use std::sync::Arc;

use tracing::info;

use crate::cache::{CachingProvider, RuleSetProvider, TtlRuleCache};
use crate::config::{FluxgateConfig, ReloadStrategyMode};
use crate::engine::{DynEngine, Engine};
use crate::error::FluxgateError;
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::reload::polling::PollingReloadStrategy;
use crate::reload::pubsub::PubsubReloadStrategy;
use crate::reload::{ReloadSink, ReloadStrategy};
use crate::resilience::ResilienceEnvelope;
use crate::store::RedisTokenBucketStore;

/// Shared, cheaply-cloneable application state (spec.md §4.7/§4.9). Composed
/// once at startup by [`FluxgateState::bootstrap`] and handed to both the
/// admin server and the decision-endpoint server.
#[derive(Clone)]
pub struct FluxgateState {
    pub config: Arc<FluxgateConfig>,
    pub metrics: Metrics,
    pub store: Arc<RedisTokenBucketStore>,
    pub cache: Arc<TtlRuleCache>,
    pub engine: Arc<DynEngine>,
    reload_strategy: Option<Arc<dyn ReloadStrategy>>,
}

impl FluxgateState {
    /// Wires store → resilience envelope → limiter → cache → provider →
    /// engine, then starts whichever reload strategy the config selects.
    /// `provider` is the backing rule-set source (e.g. a control-store client,
    /// or [`crate::cache::StaticRuleSetProvider`] for an embedded deployment).
    pub async fn bootstrap(config: FluxgateConfig, provider: Arc<dyn RuleSetProvider>) -> Result<Self, FluxgateError> {
        let metrics = Metrics::install();

        let store = Arc::new(RedisTokenBucketStore::connect(&config.store.redis_url).await?);
        let envelope = Arc::new(ResilienceEnvelope::new(
            store.clone(),
            &config.retry,
            &config.circuit_breaker,
            config.store.call_timeout_ms,
        ));
        let limiter = RateLimiter::new(envelope);

        // NONE disables caching entirely — a zero TTL makes every entry
        // expire immediately, so the provider is hit on every lookup
        // (spec.md §4.6) without needing a second code path for "no cache".
        let cache_ttl = if matches!(config.reload.strategy, ReloadStrategyMode::None) {
            std::time::Duration::ZERO
        } else {
            std::time::Duration::from_secs(config.cache.ttl_secs)
        };
        let cache = Arc::new(TtlRuleCache::new(cache_ttl, config.cache.max_size));
        cache.start_gc();

        let caching_provider = CachingProvider::new(provider, cache.clone());
        let engine: Arc<DynEngine> = Arc::new(Engine::new(caching_provider, limiter, config.rate_limit.on_missing_rule_set));

        let reload_strategy = Self::start_reload(&config, cache.clone())?;

        Ok(Self {
            config: Arc::new(config),
            metrics,
            store,
            cache,
            engine,
            reload_strategy,
        })
    }

    fn start_reload(
        config: &FluxgateConfig,
        sink: Arc<TtlRuleCache>,
    ) -> Result<Option<Arc<dyn ReloadStrategy>>, FluxgateError> {
        let sink: Arc<dyn ReloadSink> = sink;
        match config.reload.strategy {
            ReloadStrategyMode::None => {
                info!("reload: disabled");
                Ok(None)
            }
            ReloadStrategyMode::Polling => {
                let strategy = PollingReloadStrategy::start_with(
                    std::time::Duration::from_secs(config.reload.polling.initial_delay_secs),
                    std::time::Duration::from_secs(config.reload.polling.interval_secs),
                    sink,
                );
                Ok(Some(Arc::new(strategy)))
            }
            ReloadStrategyMode::Pubsub => {
                let client = redis::Client::open(config.store.redis_url.as_str())
                    .map_err(|e| FluxgateError::Config(format!("invalid redis url: {}", e)))?;
                let strategy = PubsubReloadStrategy::start(client, config.reload.pubsub.channel.clone(), sink);
                Ok(Some(Arc::new(strategy)))
            }
            ReloadStrategyMode::Auto => {
                // AUTO picks pub/sub when the store exposes one, else polling
                // (spec.md §4.6). The backing store here is always Redis, which
                // always exposes pub/sub, so AUTO and PUBSUB coincide.
                let client = redis::Client::open(config.store.redis_url.as_str())
                    .map_err(|e| FluxgateError::Config(format!("invalid redis url: {}", e)))?;
                let strategy = PubsubReloadStrategy::start(client, config.reload.pubsub.channel.clone(), sink);
                info!("reload: AUTO mode selected pub/sub");
                Ok(Some(Arc::new(strategy)))
            }
        }
    }

    /// Signals the reload subscriber to stop; part of graceful shutdown.
    pub async fn shutdown(&self) {
        if let Some(ref strategy) = self.reload_strategy {
            strategy.stop().await;
        }
    }
}
