pub mod pubsub;
pub mod polling;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a reload event originated (spec.md §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReloadSource {
    Pubsub,
    Polling,
    Manual,
    Api,
    Startup,
}

impl ReloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadSource::Pubsub => "PUBSUB",
            ReloadSource::Polling => "POLLING",
            ReloadSource::Manual => "MANUAL",
            ReloadSource::Api => "API",
            ReloadSource::Startup => "STARTUP",
        }
    }
}

/// A rule-set invalidation notice. `rule_set_id` of `None` means "invalidate
/// everything" (full reload), matching the polling strategy's behavior and a
/// pub/sub payload that omits the field. Wire shape is spec.md §6's literal
/// `{ruleSetId?: string, source: string, timestamp: iso8601, metadata?: {}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadEvent {
    pub rule_set_id: Option<String>,
    pub source: ReloadSource,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl ReloadEvent {
    pub fn single(rule_set_id: impl Into<String>, source: ReloadSource, timestamp: DateTime<Utc>) -> Self {
        Self {
            rule_set_id: Some(rule_set_id.into()),
            source,
            timestamp,
            metadata: None,
        }
    }

    pub fn full(source: ReloadSource, timestamp: DateTime<Utc>) -> Self {
        Self {
            rule_set_id: None,
            source,
            timestamp,
            metadata: None,
        }
    }
}

/// The consumer-side interface a reload strategy depends on. The cache
/// implements this rather than the strategy depending on the cache directly —
/// breaks the circular dependency noted in spec.md §9 between the provider
/// (which wraps the cache) and the reload subscriber (which would otherwise
/// need to reach back into the provider to invalidate it).
pub trait ReloadSink: Send + Sync {
    fn on_reload(&self, event: ReloadEvent);
}

/// A running reload strategy. `stop` is cooperative: it signals the
/// background task to exit at its next checkpoint rather than aborting it.
#[async_trait::async_trait]
pub trait ReloadStrategy: Send + Sync {
    async fn stop(&self);
}

/// Sleep for `duration`, returning early (with `true`) if shutdown fires.
pub(crate) async fn sleep_or_shutdown(duration: std::time::Duration, shutdown: &tokio::sync::Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.notified() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_event_has_no_rule_set_id() {
        let event = ReloadEvent::full(ReloadSource::Polling, Utc::now());
        assert!(event.rule_set_id.is_none());
    }

    #[test]
    fn single_event_round_trips_through_json() {
        let event = ReloadEvent::single("rs1", ReloadSource::Pubsub, Utc::now());
        let json = serde_json::to_string(&event).unwrap();
        let back: ReloadEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rule_set_id.as_deref(), Some("rs1"));
        assert_eq!(back.source, ReloadSource::Pubsub);
    }

    #[test]
    fn parses_spec_conformant_payload_missing_rule_set_id_and_timestamp_optional_fields() {
        let json = r#"{"ruleSetId":"X","source":"PUBSUB","timestamp":"2024-01-01T00:00:00Z"}"#;
        let event: ReloadEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.rule_set_id.as_deref(), Some("X"));
        assert_eq!(event.source, ReloadSource::Pubsub);
        assert!(event.metadata.is_none());
    }
}
