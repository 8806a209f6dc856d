use std::sync::Arc;

use crate::error::FluxgateError;
use crate::model::key;
use crate::model::{RequestContext, RuleSet, Verdict};
use crate::resilience::ResilienceEnvelope;
use crate::store::{BandSpec, BucketState};

/// Composes the key resolver and the resilience-wrapped store per spec.md
/// §4.4. Grounded on the teacher's `rate_limit_on_request` top-level dispatch
/// and its `metrics::counter!` instrumentation around the allow/reject path.
pub struct RateLimiter {
    envelope: Arc<ResilienceEnvelope>,
}

impl RateLimiter {
    pub fn new(envelope: Arc<ResilienceEnvelope>) -> Self {
        Self { envelope }
    }

    pub async fn check(
        &self,
        rule_set: &RuleSet,
        context: &RequestContext,
        permits: u64,
    ) -> Result<Verdict, FluxgateError> {
        let Some(rule) = rule_set.first_enabled() else {
            return Ok(Verdict::allowed_no_rule());
        };

        let resolved = key::resolve(rule, context)?;
        let specs: Vec<(String, &crate::model::Band)> = rule
            .bands()
            .iter()
            .map(|band| {
                (
                    key::bucket_key(rule_set.id(), rule.id(), &resolved.value, band.label()),
                    band,
                )
            })
            .collect();
        let band_specs: Vec<BandSpec<'_>> = specs
            .iter()
            .map(|(bucket_key, band)| BandSpec {
                bucket_key: bucket_key.clone(),
                band,
            })
            .collect();

        let states = self.envelope.try_consume_bands(&band_specs, permits).await?;
        let verdict = combine(rule, &resolved.value, states);

        if verdict.allowed {
            metrics::counter!(
                "fluxgate_allowed_total",
                "rule_set" => rule_set.id().to_string(),
                "rule" => rule.id().to_string(),
            )
            .increment(1);
        } else {
            metrics::counter!(
                "fluxgate_rejected_total",
                "rule_set" => rule_set.id().to_string(),
                "rule" => rule.id().to_string(),
            )
            .increment(1);
        }

        metrics::gauge!(
            "fluxgate_remaining_tokens",
            "rule_set" => rule_set.id().to_string(),
            "rule" => rule.id().to_string(),
        )
        .set(verdict.remaining_tokens as f64);

        Ok(verdict)
    }
}

/// Combines per-band results into one verdict (spec.md §4.4 steps 4-5): any
/// rejecting band rejects the whole rule; `remainingTokens` is the minimum
/// across bands, `nanosToWaitForRefill` the maximum.
fn combine(rule: &crate::model::Rule, scope_value: &str, states: Vec<BucketState>) -> Verdict {
    let allowed = states.iter().all(|s| s.consumed);
    let remaining = states.iter().map(|s| s.remaining_tokens).min().unwrap_or(0);
    let wait = states.iter().map(|s| s.nanos_to_wait_for_refill).max().unwrap_or(0);

    Verdict {
        allowed,
        matched_rule: Some(crate::model::MatchedRule {
            id: rule.id().to_string(),
            name: rule.name().to_string(),
            on_limit_exceed_policy: rule.on_limit_exceed_policy(),
        }),
        key: Some(scope_value.to_string()),
        remaining_tokens: remaining,
        nanos_to_wait_for_refill: if allowed { 0 } else { wait },
    }
}
