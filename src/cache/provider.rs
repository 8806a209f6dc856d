use async_trait::async_trait;

use crate::model::RuleSet;

/// Backed by the control store (e.g. a document database); that backing is
/// out of scope here (spec.md §1/§4.5).
#[async_trait]
pub trait RuleSetProvider: Send + Sync {
    async fn find_by_id(&self, rule_set_id: &str) -> Option<RuleSet>;
}

/// In-memory provider for embedded deployments with no control plane, and
/// for tests. Rule-sets are supplied up front and never change on their own
/// — reload events still flow through the cache in front of it.
pub struct StaticRuleSetProvider {
    sets: dashmap::DashMap<String, RuleSet>,
}

impl StaticRuleSetProvider {
    pub fn new() -> Self {
        Self {
            sets: dashmap::DashMap::new(),
        }
    }

    pub fn upsert(&self, rule_set: RuleSet) {
        self.sets.insert(rule_set.id().to_string(), rule_set);
    }
}

impl Default for StaticRuleSetProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleSetProvider for StaticRuleSetProvider {
    async fn find_by_id(&self, rule_set_id: &str) -> Option<RuleSet> {
        self.sets.get(rule_set_id).map(|r| r.clone())
    }
}

/// Loads a fixed snapshot of rule-sets from a JSON file at construction time.
/// The standalone binary's default provider when no control-store
/// integration is wired in — serialization of rule documents in that store is
/// out of scope here (spec.md §1), but a local file is the natural stand-in
/// for running fluxgate on its own.
pub struct FileRuleSetProvider {
    inner: StaticRuleSetProvider,
}

impl FileRuleSetProvider {
    pub fn load(path: &std::path::Path) -> Result<Self, crate::error::FluxgateError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::FluxgateError::Config(format!("reading {}: {}", path.display(), e)))?;
        let rule_sets: Vec<RuleSet> =
            serde_json::from_str(&content).map_err(|e| crate::error::FluxgateError::Config(e.to_string()))?;

        let inner = StaticRuleSetProvider::new();
        for rule_set in rule_sets {
            inner.upsert(rule_set);
        }
        Ok(Self { inner })
    }
}

#[async_trait]
impl RuleSetProvider for FileRuleSetProvider {
    async fn find_by_id(&self, rule_set_id: &str) -> Option<RuleSet> {
        self.inner.find_by_id(rule_set_id).await
    }
}

/// Lets server wiring hold a single boxed provider (e.g. behind an `Engine`)
/// without threading a provider type parameter through the whole call stack.
#[async_trait]
impl RuleSetProvider for std::sync::Arc<dyn RuleSetProvider> {
    async fn find_by_id(&self, rule_set_id: &str) -> Option<RuleSet> {
        (**self).find_by_id(rule_set_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rule::RuleBuilder;
    use crate::model::{Band, Scope};
    use std::time::Duration;

    #[tokio::test]
    async fn static_provider_round_trips() {
        let provider = StaticRuleSetProvider::new();
        let rule = RuleBuilder::new("r1", "rs1", Scope::Global)
            .band(Band::new(Duration::from_secs(1), 1, None).unwrap())
            .build()
            .unwrap();
        provider.upsert(RuleSet::new("rs1", vec![rule]));

        assert!(provider.find_by_id("rs1").await.is_some());
        assert!(provider.find_by_id("missing").await.is_none());
    }
}
