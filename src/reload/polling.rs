use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;

use super::{sleep_or_shutdown, ReloadEvent, ReloadSink, ReloadSource, ReloadStrategy};

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Emits a full-invalidation reload event on a fixed interval, regardless of
/// whether anything actually changed (spec.md §4.6). Used when no pub/sub
/// transport is configured, or as the fallback half of AUTO mode.
pub struct PollingReloadStrategy {
    shutdown: Arc<Notify>,
}

impl PollingReloadStrategy {
    pub fn start(sink: Arc<dyn ReloadSink>) -> Self {
        Self::start_with(DEFAULT_INITIAL_DELAY, DEFAULT_INTERVAL, sink)
    }

    pub fn start_with(initial_delay: Duration, interval: Duration, sink: Arc<dyn ReloadSink>) -> Self {
        let shutdown = Arc::new(Notify::new());
        let task_shutdown = shutdown.clone();

        tokio::spawn(async move {
            if sleep_or_shutdown(initial_delay, &task_shutdown).await {
                return;
            }
            loop {
                sink.on_reload(ReloadEvent {
                    rule_set_id: None,
                    source: ReloadSource::Polling,
                    timestamp: Utc::now(),
                    metadata: None,
                });

                if sleep_or_shutdown(interval, &task_shutdown).await {
                    return;
                }
            }
        });

        Self { shutdown }
    }
}

#[async_trait::async_trait]
impl ReloadStrategy for PollingReloadStrategy {
    async fn stop(&self) {
        self.shutdown.notify_one();
    }
}
