pub mod provider;

pub use provider::{FileRuleSetProvider, RuleSetProvider, StaticRuleSetProvider};

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::model::RuleSet;
use crate::reload::{ReloadEvent, ReloadSink};

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_SIZE: usize = 1_000;
const GC_INTERVAL: Duration = Duration::from_secs(60);

/// Cache contract (spec.md §4.5): `get`, `put`, `invalidate`, `invalidate_all`,
/// `size`.
#[async_trait]
pub trait RuleCache: Send + Sync {
    async fn get(&self, id: &str) -> Option<RuleSet>;
    async fn put(&self, id: &str, rule_set: RuleSet);
    async fn invalidate(&self, id: &str);
    async fn invalidate_all(&self);
    fn size(&self) -> usize;
}

struct CacheEntry {
    rule_set: RuleSet,
    inserted_at: Instant,
}

/// TTL + size-bound rule-set cache. Grounded on the same DashMap-keyed,
/// age-tracked, periodically-GC'd shape as the bucket/window caches it is
/// descended from — adapted here to cache `RuleSet` instead of bucket state.
pub struct TtlRuleCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_size: usize,
}

impl TtlRuleCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_size,
        }
    }

    /// Spawn the periodic GC task. Mirrors the teacher's `start_gc`: runs
    /// every `GC_INTERVAL`, drops expired entries, then force-evicts the
    /// oldest entries if still over `max_size`.
    pub fn start_gc(self: &Arc<Self>) {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(GC_INTERVAL);
            loop {
                interval.tick().await;
                cache.gc_once();
            }
        });
    }

    fn gc_once(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| now.duration_since(entry.inserted_at) < self.ttl);

        if self.entries.len() > self.max_size {
            let mut ages: Vec<(String, Instant)> = self
                .entries
                .iter()
                .map(|e| (e.key().clone(), e.value().inserted_at))
                .collect();
            ages.sort_by_key(|(_, inserted_at)| *inserted_at);
            let overflow = self.entries.len() - self.max_size;
            for (key, _) in ages.into_iter().take(overflow) {
                self.entries.remove(&key);
            }
            metrics::counter!("fluxgate_cache_evictions_total").increment(overflow as u64);
        }

        metrics::gauge!("fluxgate_cache_size").set(self.entries.len() as f64);
    }
}

impl Default for TtlRuleCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_SIZE)
    }
}

#[async_trait]
impl RuleCache for TtlRuleCache {
    async fn get(&self, id: &str) -> Option<RuleSet> {
        let fresh = self
            .entries
            .get(id)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.rule_set.clone());

        match fresh {
            Some(rule_set) => {
                metrics::counter!("fluxgate_cache_hit_total").increment(1);
                Some(rule_set)
            }
            None => {
                // Either absent, or present-but-expired — drop a stale entry
                // now so it doesn't linger until the next GC pass.
                self.entries.remove(id);
                metrics::counter!("fluxgate_cache_miss_total").increment(1);
                None
            }
        }
    }

    async fn put(&self, id: &str, rule_set: RuleSet) {
        if !self.entries.contains_key(id) && self.entries.len() >= self.max_size {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|e| e.value().inserted_at)
                .map(|e| e.key().clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            id.to_string(),
            CacheEntry {
                rule_set,
                inserted_at: Instant::now(),
            },
        );
        metrics::gauge!("fluxgate_cache_size").set(self.entries.len() as f64);
    }

    async fn invalidate(&self, id: &str) {
        self.entries.remove(id);
    }

    async fn invalidate_all(&self) {
        self.entries.clear();
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}

impl ReloadSink for TtlRuleCache {
    /// A missing `rule_set_id` denotes a full invalidation (spec.md §4.6).
    fn on_reload(&self, event: ReloadEvent) {
        match event.rule_set_id {
            Some(id) => {
                self.entries.remove(&id);
            }
            None => self.entries.clear(),
        }
        metrics::counter!("fluxgate_reload_events_total", "source" => event.source.as_str()).increment(1);
    }
}

/// Wraps a raw `RuleSetProvider` with the cache contract from spec.md §4.5:
/// on `find_by_id`, return the cached entry if present; otherwise delegate,
/// cache the result if non-empty (never cache negatives), and return.
pub struct CachingProvider<P: RuleSetProvider> {
    provider: P,
    cache: Arc<TtlRuleCache>,
}

impl<P: RuleSetProvider> CachingProvider<P> {
    pub fn new(provider: P, cache: Arc<TtlRuleCache>) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &Arc<TtlRuleCache> {
        &self.cache
    }
}

#[async_trait]
impl<P: RuleSetProvider> RuleSetProvider for CachingProvider<P> {
    async fn find_by_id(&self, rule_set_id: &str) -> Option<RuleSet> {
        if let Some(cached) = self.cache.get(rule_set_id).await {
            return Some(cached);
        }
        let found = self.provider.find_by_id(rule_set_id).await;
        if let Some(ref rule_set) = found {
            self.cache.put(rule_set_id, rule_set.clone()).await;
        }
        found
    }
}
