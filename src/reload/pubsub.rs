use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::Notify;

use super::{sleep_or_shutdown, ReloadEvent, ReloadSink, ReloadSource, ReloadStrategy};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Subscribes to the rule-reload pub/sub channel (default `fluxgate:rule-reload`,
/// spec.md §6) and invalidates the cache on every message. Reconnects on
/// stream end or subscribe failure, grounded on the teacher's watch-loop
/// reconnect shape (spawn a task owning its own retry loop, select shutdown
/// against the next event).
pub struct PubsubReloadStrategy {
    shutdown: Arc<Notify>,
}

impl PubsubReloadStrategy {
    pub fn start(client: redis::Client, channel: String, sink: Arc<dyn ReloadSink>) -> Self {
        let shutdown = Arc::new(Notify::new());
        let task_shutdown = shutdown.clone();

        tokio::spawn(async move {
            loop {
                match client.get_async_pubsub().await {
                    Ok(mut pubsub) => {
                        if let Err(e) = pubsub.subscribe(&channel).await {
                            tracing::error!("reload: pubsub subscribe failed, error={}", e);
                        } else {
                            tracing::info!("reload: subscribed to {}", channel);
                            let mut stream = pubsub.on_message();
                            loop {
                                tokio::select! {
                                    msg = stream.next() => {
                                        match msg {
                                            Some(msg) => handle_message(msg, sink.as_ref()),
                                            None => break,
                                        }
                                    }
                                    _ = task_shutdown.notified() => return,
                                }
                            }
                            tracing::warn!("reload: pubsub stream ended, reconnecting...");
                        }
                    }
                    Err(e) => {
                        tracing::error!("reload: pubsub connect failed, error={}", e);
                    }
                }

                if sleep_or_shutdown(RECONNECT_BACKOFF, &task_shutdown).await {
                    return;
                }
            }
        });

        Self { shutdown }
    }
}

fn handle_message(msg: redis::Msg, sink: &dyn ReloadSink) {
    let payload: String = match msg.get_payload() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("reload: non-string pubsub payload, error={}", e);
            return;
        }
    };

    let event: ReloadEvent = match serde_json::from_str(&payload) {
        Ok(ev) => ev,
        Err(_) => {
            // Not a structured event — treat the payload itself as the rule-set id,
            // matching a bare `PUBLISH fluxgate:rule-reload <ruleSetId>`.
            ReloadEvent::single(payload, ReloadSource::Pubsub, Utc::now())
        }
    };

    sink.on_reload(event);
}

#[async_trait::async_trait]
impl ReloadStrategy for PubsubReloadStrategy {
    async fn stop(&self) {
        self.shutdown.notify_one();
    }
}
