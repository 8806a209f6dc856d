use std::borrow::Cow;

use super::context::RequestContext;
use super::rule::{Rule, Scope};
use crate::error::FluxgateError;

/// Result of resolving a scope value: the value itself, plus whether it was
/// produced by the PER_USER/PER_API_KEY fallback-to-clientIp path (spec.md §9
/// open question — preserved behavior, made observable rather than silent).
pub struct ResolvedKey<'a> {
    pub value: Cow<'a, str>,
    pub was_fallback: bool,
}

/// Maps `(rule, context) -> scopeValue` per spec.md §4.1. Never returns an
/// empty string; an absent value with no fallback resolves to `"unknown"`.
pub fn resolve<'a>(rule: &Rule, ctx: &'a RequestContext) -> Result<ResolvedKey<'a>, FluxgateError> {
    match rule.scope() {
        Scope::Global => Ok(ResolvedKey {
            value: Cow::Borrowed("global"),
            was_fallback: false,
        }),
        Scope::PerIp => Ok(ResolvedKey {
            value: Cow::Borrowed(non_empty(&ctx.client_ip)),
            was_fallback: false,
        }),
        Scope::PerUser => Ok(resolve_with_fallback(ctx.user_id.as_deref(), &ctx.client_ip)),
        Scope::PerApiKey => Ok(resolve_with_fallback(ctx.api_key.as_deref(), &ctx.client_ip)),
        Scope::Custom => {
            let strategy_id = rule.key_strategy_id().unwrap_or("");
            if strategy_id.is_empty() {
                return Err(FluxgateError::Config(format!(
                    "rule {} has scope CUSTOM but no keyStrategyId",
                    rule.id()
                )));
            }
            let value = ctx
                .attributes
                .get(strategy_id)
                .map(attribute_to_string)
                .unwrap_or_else(|| "unknown".to_string());
            Ok(ResolvedKey {
                value: Cow::Owned(value),
                was_fallback: false,
            })
        }
    }
}

fn resolve_with_fallback<'a>(primary: Option<&'a str>, client_ip: &'a str) -> ResolvedKey<'a> {
    match primary.filter(|v| !v.is_empty()) {
        Some(v) => ResolvedKey {
            value: Cow::Borrowed(v),
            was_fallback: false,
        },
        None => ResolvedKey {
            value: Cow::Borrowed(non_empty(client_ip)),
            was_fallback: true,
        },
    }
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() {
        "unknown"
    } else {
        s
    }
}

fn attribute_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deterministic bucket-key string (spec.md §3): stable across processes
/// given the same inputs.
pub fn bucket_key(rule_set_id: &str, rule_id: &str, scope_value: &str, band_label: &str) -> String {
    format!("fluxgate:{}:{}:{}:{}", rule_set_id, rule_id, scope_value, band_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::band::Band;
    use crate::model::rule::RuleBuilder;
    use std::time::Duration;

    fn band() -> Band {
        Band::new(Duration::from_secs(60), 100, None).unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext::new("203.0.113.10", "/api/widgets", "GET")
    }

    #[test]
    fn global_scope_is_literal() {
        let rule = RuleBuilder::new("r1", "rs", Scope::Global).band(band()).build().unwrap();
        let resolved = resolve(&rule, &ctx()).unwrap();
        assert_eq!(resolved.value, "global");
        assert!(!resolved.was_fallback);
    }

    #[test]
    fn per_ip_uses_client_ip() {
        let rule = RuleBuilder::new("r1", "rs", Scope::PerIp).band(band()).build().unwrap();
        let resolved = resolve(&rule, &ctx()).unwrap();
        assert_eq!(resolved.value, "203.0.113.10");
    }

    #[test]
    fn per_user_falls_back_to_client_ip_when_absent() {
        let rule = RuleBuilder::new("r1", "rs", Scope::PerUser).band(band()).build().unwrap();
        let resolved = resolve(&rule, &ctx()).unwrap();
        assert_eq!(resolved.value, "203.0.113.10");
        assert!(resolved.was_fallback);
    }

    #[test]
    fn per_user_prefers_user_id() {
        let rule = RuleBuilder::new("r1", "rs", Scope::PerUser).band(band()).build().unwrap();
        let ctx = ctx().with_user_id("user-A");
        let resolved = resolve(&rule, &ctx).unwrap();
        assert_eq!(resolved.value, "user-A");
        assert!(!resolved.was_fallback);
    }

    #[test]
    fn per_api_key_prefers_api_key_over_fallback() {
        let rule = RuleBuilder::new("r1", "rs", Scope::PerApiKey).band(band()).build().unwrap();
        let ctx = ctx().with_api_key("key-123");
        let resolved = resolve(&rule, &ctx).unwrap();
        assert_eq!(resolved.value, "key-123");
    }

    #[test]
    fn custom_scope_reads_attribute_by_key_strategy_id() {
        let rule = RuleBuilder::new("r1", "rs", Scope::Custom)
            .key_strategy_id("ipUser")
            .band(band())
            .build()
            .unwrap();
        let ctx = ctx().with_attribute("ipUser", serde_json::json!("192.168.1.100:user-A"));
        let resolved = resolve(&rule, &ctx).unwrap();
        assert_eq!(resolved.value, "192.168.1.100:user-A");
    }

    #[test]
    fn custom_scope_missing_attribute_yields_unknown() {
        let rule = RuleBuilder::new("r1", "rs", Scope::Custom)
            .key_strategy_id("ipUser")
            .band(band())
            .build()
            .unwrap();
        let resolved = resolve(&rule, &ctx()).unwrap();
        assert_eq!(resolved.value, "unknown");
    }

    #[test]
    fn bucket_key_format() {
        let key = bucket_key("rs1", "r1", "203.0.113.10", "default");
        assert_eq!(key, "fluxgate:rs1:r1:203.0.113.10:default");
    }
}
