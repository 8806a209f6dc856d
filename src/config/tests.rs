use super::types::*;
use super::FluxgateConfig;
use std::path::Path;

#[test]
fn test_load_missing_path_yields_defaults() {
    let cfg = FluxgateConfig::load(Path::new("/nonexistent/fluxgate.toml")).unwrap();
    assert_eq!(cfg.rate_limit.on_missing_rule_set, OnMissingRuleSetStrategy::Throw);
    assert_eq!(cfg.cache.ttl_secs, 300);
    assert_eq!(cfg.reload.strategy, ReloadStrategyMode::Auto);
}

#[test]
fn test_load_toml_config() {
    let toml = r#"
        [store]
        redis_url = "redis://cache.internal:6379"

        [cache]
        ttl = 60
        max_size = 10

        [circuit_breaker]
        failure_threshold = 10
    "#;
    let tmp = std::env::temp_dir().join("fluxgate_test_config.toml");
    std::fs::write(&tmp, toml).unwrap();
    let cfg = FluxgateConfig::load(&tmp).unwrap();
    std::fs::remove_file(&tmp).ok();

    assert_eq!(cfg.store.redis_url, "redis://cache.internal:6379");
    assert_eq!(cfg.cache.ttl_secs, 60);
    assert_eq!(cfg.cache.max_size, 10);
    assert_eq!(cfg.circuit_breaker.failure_threshold, 10);
}

#[test]
fn test_load_json_config() {
    let json = r#"{
        "rateLimit": { "onMissingRuleSet": "ALLOW" },
        "reload": { "strategy": "POLLING" }
    }"#;
    let tmp = std::env::temp_dir().join("fluxgate_test_config.json");
    std::fs::write(&tmp, json).unwrap();
    let cfg = FluxgateConfig::load(&tmp).unwrap();
    std::fs::remove_file(&tmp).ok();

    assert_eq!(cfg.rate_limit.on_missing_rule_set, OnMissingRuleSetStrategy::Allow);
    assert_eq!(cfg.reload.strategy, ReloadStrategyMode::Polling);
}

#[test]
fn test_validate_rejects_zero_cache_size() {
    let mut cfg = FluxgateConfig::default();
    cfg.cache.max_size = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_retry_attempts() {
    let mut cfg = FluxgateConfig::default();
    cfg.retry.max_attempts = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_env_override_redis_url() {
    std::env::set_var("FLUXGATE_REDIS_URL", "redis://overridden:6379");
    let cfg = FluxgateConfig::load(Path::new("/nonexistent/fluxgate.toml")).unwrap();
    std::env::remove_var("FLUXGATE_REDIS_URL");
    assert_eq!(cfg.store.redis_url, "redis://overridden:6379");
}
