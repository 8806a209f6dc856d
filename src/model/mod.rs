pub mod band;
pub mod context;
pub mod key;
pub mod rule;
pub mod ruleset;

pub use band::Band;
pub use context::RequestContext;
pub use rule::{OnLimitExceedPolicy, Rule, RuleBuilder, Scope};
pub use ruleset::RuleSet;

/// Result of one engine check (spec.md §3). When no rule matched, `allowed`
/// is true, `remaining_tokens` is reported as effectively unlimited, and
/// `matched_rule` is absent.
#[derive(Clone, Debug)]
pub struct Verdict {
    pub allowed: bool,
    pub matched_rule: Option<MatchedRule>,
    pub key: Option<String>,
    pub remaining_tokens: u64,
    pub nanos_to_wait_for_refill: u64,
}

#[derive(Clone, Debug)]
pub struct MatchedRule {
    pub id: String,
    pub name: String,
    pub on_limit_exceed_policy: OnLimitExceedPolicy,
}

impl Verdict {
    /// Effectively-unlimited remaining tokens reported when no rule matched.
    pub const UNLIMITED: u64 = u64::MAX;

    pub fn allowed_no_rule() -> Self {
        Self {
            allowed: true,
            matched_rule: None,
            key: None,
            remaining_tokens: Self::UNLIMITED,
            nanos_to_wait_for_refill: 0,
        }
    }
}
