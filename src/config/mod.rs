pub mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use crate::error::FluxgateError;
use std::path::Path;

impl FluxgateConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// overrides for infra settings. Missing file falls back to defaults —
    /// adapted from the teacher's `GatewayConfig::load`.
    pub fn load(path: &Path) -> Result<Self, FluxgateError> {
        let mut config: FluxgateConfig = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| FluxgateError::Config(format!("reading {}: {}", path.display(), e)))?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content).map_err(|e| FluxgateError::Config(e.to_string()))?,
                Some("json") => {
                    serde_json::from_str(&content).map_err(|e| FluxgateError::Config(e.to_string()))?
                }
                Some(ext) => {
                    return Err(FluxgateError::Config(format!(
                        "unsupported config format: .{ext}, use .toml or .json"
                    )))
                }
                None => {
                    return Err(FluxgateError::Config(
                        "config file has no extension, use .toml or .json".to_string(),
                    ))
                }
            }
        } else {
            tracing::info!("config file not found at {}, using defaults", path.display());
            FluxgateConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!("loaded fluxgate configuration");
        Ok(config)
    }

    /// Infra-only overrides (store connection, listen addresses). Rule
    /// definitions always come from the rule-set provider, never from this
    /// crate's own config file or env vars — mirrors the teacher's hard
    /// boundary between infra config and control-plane-owned business config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FLUXGATE_REDIS_URL") {
            self.store.redis_url = v;
        }
        if let Ok(v) = std::env::var("FLUXGATE_LISTEN") {
            self.server.listen = v;
        }
        if let Ok(v) = std::env::var("FLUXGATE_ADMIN_LISTEN") {
            self.server.admin_listen = v;
        }
        if let Ok(v) = std::env::var("FLUXGATE_RELOAD_PUBSUB_CHANNEL") {
            self.reload.pubsub.channel = v;
        }
    }

    pub fn validate(&self) -> Result<(), FluxgateError> {
        if self.store.redis_url.is_empty() {
            return Err(FluxgateError::Config("store.redis_url cannot be empty".to_string()));
        }
        if self.cache.max_size == 0 {
            return Err(FluxgateError::Config("cache.max_size must be >= 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(FluxgateError::Config("retry.max_attempts must be >= 1".to_string()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(FluxgateError::Config(
                "circuit_breaker.failure_threshold must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
