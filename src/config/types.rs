use serde::{Deserialize, Serialize};

/// Top-level configuration (spec.md §6 "Configuration surface").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxgateConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub reload: ReloadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Per-attempt timeout for a store call (spec.md §5 "Cancellation and timeouts").
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnMissingRuleSetStrategy {
    Throw,
    Allow,
}

impl Default for OnMissingRuleSetStrategy {
    fn default() -> Self {
        OnMissingRuleSetStrategy::Throw
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    #[serde(default)]
    pub default_rule_set_id: Option<String>,
    #[serde(default)]
    pub on_missing_rule_set: OnMissingRuleSetStrategy,
    #[serde(default)]
    pub wait_for_refill: WaitForRefillConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_rule_set_id: None,
            on_missing_rule_set: OnMissingRuleSetStrategy::default(),
            wait_for_refill: WaitForRefillConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForRefillConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_wait_time_ms")]
    pub max_wait_time_ms: u64,
    #[serde(default = "default_max_concurrent_waits")]
    pub max_concurrent_waits: usize,
}

impl Default for WaitForRefillConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_wait_time_ms: default_max_wait_time_ms(),
            max_concurrent_waits: default_max_concurrent_waits(),
        }
    }
}

fn default_max_wait_time_ms() -> u64 {
    5_000
}

fn default_max_concurrent_waits() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs", rename = "ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            max_size: default_cache_max_size(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_size() -> usize {
    1_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReloadStrategyMode {
    Auto,
    Pubsub,
    Polling,
    None,
}

impl Default for ReloadStrategyMode {
    fn default() -> Self {
        ReloadStrategyMode::Auto
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadConfig {
    #[serde(default)]
    pub strategy: ReloadStrategyMode,
    #[serde(default)]
    pub polling: PollingReloadConfig,
    #[serde(default)]
    pub pubsub: PubsubReloadConfig,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            strategy: ReloadStrategyMode::default(),
            polling: PollingReloadConfig::default(),
            pubsub: PubsubReloadConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingReloadConfig {
    #[serde(default = "default_polling_interval_secs", rename = "interval")]
    pub interval_secs: u64,
    #[serde(default = "default_polling_initial_delay_secs", rename = "initialDelay")]
    pub initial_delay_secs: u64,
}

impl Default for PollingReloadConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_polling_interval_secs(),
            initial_delay_secs: default_polling_initial_delay_secs(),
        }
    }
}

fn default_polling_interval_secs() -> u64 {
    30
}

fn default_polling_initial_delay_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubReloadConfig {
    #[serde(default = "default_pubsub_channel")]
    pub channel: String,
    #[serde(default = "default_true")]
    pub retry_on_failure: bool,
    #[serde(default = "default_pubsub_retry_interval_secs", rename = "retryInterval")]
    pub retry_interval_secs: u64,
}

impl Default for PubsubReloadConfig {
    fn default() -> Self {
        Self {
            channel: default_pubsub_channel(),
            retry_on_failure: true,
            retry_interval_secs: default_pubsub_retry_interval_secs(),
        }
    }
}

fn default_pubsub_channel() -> String {
    "fluxgate:rule-reload".to_string()
}

fn default_pubsub_retry_interval_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_initial_backoff_ms", rename = "initialBackoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_retry_max_backoff_ms", rename = "maxBackoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_retry_max_attempts(),
            initial_backoff_ms: default_retry_initial_backoff_ms(),
            multiplier: default_retry_multiplier(),
            max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_initial_backoff_ms() -> u64 {
    100
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_max_backoff_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackStrategy {
    FailOpen,
    FailClosed,
}

impl Default for FallbackStrategy {
    fn default() -> Self {
        FallbackStrategy::FailOpen
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cb_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cb_wait_duration_ms")]
    pub wait_duration_in_open_state_ms: u64,
    #[serde(default = "default_cb_permitted_half_open")]
    pub permitted_calls_in_half_open_state: u32,
    #[serde(default, rename = "fallback")]
    pub fallback_strategy: FallbackStrategy,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: default_cb_failure_threshold(),
            wait_duration_in_open_state_ms: default_cb_wait_duration_ms(),
            permitted_calls_in_half_open_state: default_cb_permitted_half_open(),
            fallback_strategy: FallbackStrategy::default(),
        }
    }
}

fn default_cb_failure_threshold() -> u32 {
    5
}

fn default_cb_wait_duration_ms() -> u64 {
    30_000
}

fn default_cb_permitted_half_open() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            admin_listen: default_admin_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_admin_listen() -> String {
    "0.0.0.0:9090".to_string()
}
