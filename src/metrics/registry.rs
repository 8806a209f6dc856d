use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for store call latency (seconds).
const STORE_LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`, `gauge!`,
/// `histogram!`) can be used anywhere in the codebase. The `PrometheusHandle`
/// is retained solely for rendering the `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    ///
    /// Must be called **once** at startup before any `counter!` / `gauge!` /
    /// `histogram!` calls.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full("fluxgate_store_call_duration_seconds".to_string()),
                STORE_LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        // --- decision path ---
        describe_counter!("fluxgate_allowed_total", Unit::Count, "Total requests allowed by the rate limiter");
        describe_counter!("fluxgate_rejected_total", Unit::Count, "Total requests rejected by the rate limiter");
        describe_histogram!(
            "fluxgate_store_call_duration_seconds",
            Unit::Seconds,
            "Latency of a single token-bucket store call"
        );
        describe_gauge!(
            "fluxgate_remaining_tokens",
            Unit::Count,
            "Remaining tokens reported by the most recent verdict, by rule-set"
        );

        // --- rule-set cache ---
        describe_counter!("fluxgate_cache_hit_total", Unit::Count, "Rule-set cache hits");
        describe_counter!("fluxgate_cache_miss_total", Unit::Count, "Rule-set cache misses");
        describe_gauge!("fluxgate_cache_size", Unit::Count, "Current number of cached rule-sets");
        describe_counter!("fluxgate_cache_evictions_total", Unit::Count, "Rule-sets evicted for exceeding the size bound");
        describe_counter!("fluxgate_reload_events_total", Unit::Count, "Rule-set reload events processed, by source");

        // --- resilience envelope ---
        describe_counter!("fluxgate_store_retry_total", Unit::Count, "Store call retry attempts");
        describe_counter!(
            "fluxgate_circuit_breaker_rejected_total",
            Unit::Count,
            "Requests rejected outright because the store circuit breaker is open"
        );
        describe_gauge!(
            "fluxgate_circuit_breaker_state",
            Unit::Count,
            "Store circuit breaker state: 0=closed 1=open 2=half-open"
        );

        // --- wait-for-refill ---
        describe_counter!(
            "fluxgate_wait_for_refill_total",
            Unit::Count,
            "Requests that took the WAIT_FOR_REFILL path"
        );
        describe_counter!(
            "fluxgate_wait_for_refill_timeout_total",
            Unit::Count,
            "WAIT_FOR_REFILL attempts that exceeded the configured max wait"
        );
        describe_gauge!(
            "fluxgate_wait_for_refill_in_flight",
            Unit::Count,
            "Requests currently parked waiting for a refill"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
