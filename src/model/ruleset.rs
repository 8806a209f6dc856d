use serde::{Deserialize, Serialize};

use super::rule::Rule;

/// The unit of lookup (spec.md §3). Rules are evaluated independently; a
/// request is allowed only if every applicable rule allows it, but a single
/// engine invocation consumes from at most one matching rule per rule-set
/// (spec.md §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSet {
    id: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(id: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            id: id.into(),
            rules,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First enabled rule whose scope resolves against the given context
    /// (spec.md §4.4 step 1 — this crate does no path/method matching here,
    /// that is the caller's concern).
    pub fn first_enabled(&self) -> Option<&Rule> {
        self.rules.iter().find(|r| r.enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::band::Band;
    use crate::model::rule::{OnLimitExceedPolicy, RuleBuilder, Scope};
    use std::time::Duration;

    fn band() -> Band {
        Band::new(Duration::from_secs(60), 100, None).unwrap()
    }

    #[test]
    fn first_enabled_skips_disabled_rules() {
        let disabled = RuleBuilder::new("r1", "rs", Scope::Global)
            .enabled(false)
            .band(band())
            .build()
            .unwrap();
        let enabled = RuleBuilder::new("r2", "rs", Scope::PerIp)
            .on_limit_exceed_policy(OnLimitExceedPolicy::RejectRequest)
            .band(band())
            .build()
            .unwrap();
        let set = RuleSet::new("rs", vec![disabled, enabled]);
        assert_eq!(set.first_enabled().unwrap().id(), "r2");
    }

    #[test]
    fn serde_round_trip() {
        let rule = RuleBuilder::new("r1", "rs", Scope::Global).band(band()).build().unwrap();
        let set = RuleSet::new("rs", vec![rule]);
        let json = serde_json::to_string(&set).unwrap();
        let back: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), set.id());
        assert_eq!(back.rules().len(), 1);
    }
}
