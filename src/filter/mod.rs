pub mod decision_endpoint;

use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Semaphore;

use crate::config::WaitForRefillConfig;
use crate::engine::DynEngine;
use crate::error::FluxgateError;
use crate::model::{OnLimitExceedPolicy, RequestContext, Verdict};

/// Result of running a request through a `Filter` (spec.md §4.9 embedded mode).
pub enum FilterResult {
    /// The request's path matched no `include` pattern, or matched `exclude` —
    /// the filter has nothing to say about it.
    Skip,
    Allow(Verdict),
    Reject(Verdict),
}

/// ANT-style include/exclude path matching, same shape as the teacher's route
/// matching but scoped to rate-limit applicability rather than upstream
/// selection.
struct PathMatcher {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathMatcher {
    fn build(include: &[String], exclude: &[String]) -> Result<Self, FluxgateError> {
        let compile = |patterns: &[String]| -> Result<Option<GlobSet>, FluxgateError> {
            if patterns.is_empty() {
                return Ok(None);
            }
            let mut builder = GlobSetBuilder::new();
            for pattern in patterns {
                let glob = Glob::new(pattern)
                    .map_err(|e| FluxgateError::Config(format!("invalid glob pattern {}: {}", pattern, e)))?;
                builder.add(glob);
            }
            let set = builder
                .build()
                .map_err(|e| FluxgateError::Config(format!("invalid glob set: {}", e)))?;
            Ok(Some(set))
        };

        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    fn matches(&self, path: &str) -> bool {
        let included = self.include.as_ref().map(|s| s.is_match(path)).unwrap_or(true);
        let excluded = self.exclude.as_ref().map(|s| s.is_match(path)).unwrap_or(false);
        included && !excluded
    }
}

/// One route's rate-limit filter (spec.md §4.9): matches requests by path,
/// checks them against a fixed rule-set, and — for rules whose policy is
/// `WAIT_FOR_REFILL` — parks the request for its computed refill wait instead
/// of rejecting outright.
///
/// `wait_semaphore` bounds the number of requests parked at once
/// (`maxConcurrentWaits`); a request that cannot acquire a permit, or whose
/// wait would exceed `maxWaitTimeMs`, is rejected immediately rather than
/// queued.
pub struct Filter {
    rule_set_id: String,
    matcher: PathMatcher,
    engine: Arc<DynEngine>,
    wait_for_refill: WaitForRefillConfig,
    wait_semaphore: Arc<Semaphore>,
}

impl Filter {
    pub fn new(
        rule_set_id: impl Into<String>,
        include: &[String],
        exclude: &[String],
        engine: Arc<DynEngine>,
        wait_for_refill: WaitForRefillConfig,
    ) -> Result<Self, FluxgateError> {
        let wait_semaphore = Arc::new(Semaphore::new(wait_for_refill.max_concurrent_waits));
        Ok(Self {
            rule_set_id: rule_set_id.into(),
            matcher: PathMatcher::build(include, exclude)?,
            engine,
            wait_for_refill,
            wait_semaphore,
        })
    }

    pub async fn on_request(&self, context: &RequestContext) -> Result<FilterResult, FluxgateError> {
        if !self.matcher.matches(&context.endpoint) {
            return Ok(FilterResult::Skip);
        }

        let verdict = self.engine.check(&self.rule_set_id, context).await?;
        if verdict.allowed {
            return Ok(FilterResult::Allow(verdict));
        }

        if self.wants_wait(&verdict) {
            return self.wait_then_retry(context, verdict).await;
        }

        Ok(FilterResult::Reject(verdict))
    }

    fn wants_wait(&self, verdict: &Verdict) -> bool {
        self.wait_for_refill.enabled
            && verdict
                .matched_rule
                .as_ref()
                .is_some_and(|m| m.on_limit_exceed_policy == OnLimitExceedPolicy::WaitForRefill)
    }

    /// Single bounded retry after the computed refill wait (spec.md §4.9).
    /// The semaphore permit is held for the full wait and released on every
    /// exit path, including the retry's own error path.
    async fn wait_then_retry(&self, context: &RequestContext, first: Verdict) -> Result<FilterResult, FluxgateError> {
        let max_wait = Duration::from_millis(self.wait_for_refill.max_wait_time_ms);
        let wait = Duration::from_nanos(first.nanos_to_wait_for_refill);

        if wait > max_wait {
            metrics::counter!("fluxgate_wait_for_refill_timeout_total").increment(1);
            return Ok(FilterResult::Reject(first));
        }

        let permit = match self.wait_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                metrics::counter!("fluxgate_wait_for_refill_timeout_total").increment(1);
                return Ok(FilterResult::Reject(first));
            }
        };

        metrics::counter!("fluxgate_wait_for_refill_total").increment(1);
        metrics::gauge!("fluxgate_wait_for_refill_in_flight").increment(1.0);

        tokio::time::sleep(wait).await;
        let result = self.engine.check(&self.rule_set_id, context).await;

        metrics::gauge!("fluxgate_wait_for_refill_in_flight").decrement(1.0);
        drop(permit);

        match result {
            Ok(verdict) if verdict.allowed => Ok(FilterResult::Allow(verdict)),
            Ok(verdict) => Ok(FilterResult::Reject(verdict)),
            Err(e) => Err(e),
        }
    }
}
