use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::band::Band;
use crate::error::FluxgateError;

/// The dimension along which buckets are partitioned (spec.md §3/§4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Global,
    PerIp,
    PerUser,
    PerApiKey,
    Custom,
}

/// What happens to a request when its rule rejects (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnLimitExceedPolicy {
    RejectRequest,
    WaitForRefill,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    id: String,
    name: String,
    #[serde(default = "default_true")]
    enabled: bool,
    scope: Scope,
    #[serde(default)]
    key_strategy_id: Option<String>,
    on_limit_exceed_policy: OnLimitExceedPolicy,
    bands: Vec<Band>,
    rule_set_id: String,
    #[serde(default)]
    attributes: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn key_strategy_id(&self) -> Option<&str> {
        self.key_strategy_id.as_deref()
    }

    pub fn on_limit_exceed_policy(&self) -> OnLimitExceedPolicy {
        self.on_limit_exceed_policy
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn rule_set_id(&self) -> &str {
        &self.rule_set_id
    }

    pub fn attributes(&self) -> &HashMap<String, serde_json::Value> {
        &self.attributes
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Rule {}

/// Validating builder — invariants from spec.md §4.2/§3 are enforced here,
/// not at call sites.
pub struct RuleBuilder {
    id: String,
    name: Option<String>,
    enabled: bool,
    scope: Scope,
    key_strategy_id: Option<String>,
    on_limit_exceed_policy: OnLimitExceedPolicy,
    bands: Vec<Band>,
    rule_set_id: String,
    attributes: HashMap<String, serde_json::Value>,
}

impl RuleBuilder {
    pub fn new(id: impl Into<String>, rule_set_id: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: id.into(),
            name: None,
            enabled: true,
            scope,
            key_strategy_id: None,
            on_limit_exceed_policy: OnLimitExceedPolicy::RejectRequest,
            bands: Vec::new(),
            rule_set_id: rule_set_id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn key_strategy_id(mut self, id: impl Into<String>) -> Self {
        self.key_strategy_id = Some(id.into());
        self
    }

    pub fn on_limit_exceed_policy(mut self, policy: OnLimitExceedPolicy) -> Self {
        self.on_limit_exceed_policy = policy;
        self
    }

    pub fn band(mut self, band: Band) -> Self {
        self.bands.push(band);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Result<Rule, FluxgateError> {
        if self.bands.is_empty() {
            return Err(FluxgateError::Config(format!(
                "rule {} must declare at least one band",
                self.id
            )));
        }
        if self.scope == Scope::Custom && self.key_strategy_id.as_deref().unwrap_or("").is_empty() {
            return Err(FluxgateError::Config(format!(
                "rule {} has scope CUSTOM but no keyStrategyId",
                self.id
            )));
        }
        let name = self.name.unwrap_or_else(|| self.id.clone());
        Ok(Rule {
            id: self.id,
            name,
            enabled: self.enabled,
            scope: self.scope,
            key_strategy_id: self.key_strategy_id,
            on_limit_exceed_policy: self.on_limit_exceed_policy,
            bands: self.bands,
            rule_set_id: self.rule_set_id,
            attributes: self.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn band() -> Band {
        Band::new(Duration::from_secs(60), 100, None).unwrap()
    }

    #[test]
    fn name_defaults_to_id() {
        let rule = RuleBuilder::new("r1", "rs1", Scope::PerIp)
            .band(band())
            .build()
            .unwrap();
        assert_eq!(rule.name(), "r1");
    }

    #[test]
    fn requires_at_least_one_band() {
        let err = RuleBuilder::new("r1", "rs1", Scope::PerIp).build();
        assert!(err.is_err());
    }

    #[test]
    fn custom_scope_requires_key_strategy_id() {
        let err = RuleBuilder::new("r1", "rs1", Scope::Custom).band(band()).build();
        assert!(err.is_err());

        let ok = RuleBuilder::new("r1", "rs1", Scope::Custom)
            .key_strategy_id("ipUser")
            .band(band())
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn enabled_defaults_to_true() {
        let rule = RuleBuilder::new("r1", "rs1", Scope::Global)
            .band(band())
            .build()
            .unwrap();
        assert!(rule.enabled());
    }

    #[test]
    fn equality_is_by_id() {
        let a = RuleBuilder::new("r1", "rs1", Scope::Global).band(band()).build().unwrap();
        let b = RuleBuilder::new("r1", "rs2", Scope::PerIp)
            .band(Band::new(Duration::from_secs(1), 1, None).unwrap())
            .build()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_round_trip() {
        let rule = RuleBuilder::new("r1", "rs1", Scope::PerUser)
            .name("My rule")
            .on_limit_exceed_policy(OnLimitExceedPolicy::WaitForRefill)
            .band(band())
            .build()
            .unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
        assert_eq!(back.name(), rule.name());
        assert_eq!(back.on_limit_exceed_policy(), rule.on_limit_exceed_policy());
    }
}
