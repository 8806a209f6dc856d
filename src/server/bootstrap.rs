use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cache::RuleSetProvider;
use crate::config::FluxgateConfig;
use crate::server::{self, FluxgateState};

/// CLI arguments forwarded from `main()`.
pub struct BootstrapArgs {
    pub config_path: PathBuf,
}

/// Fluxgate server lifecycle: init → connect → serve → shutdown.
///
/// `provider` is the rule-set source backing this deployment (e.g. a
/// control-store client embedding this crate); the standalone binary wires
/// whatever provider its own CLI selects before calling this.
pub async fn run(args: BootstrapArgs, provider: Arc<dyn RuleSetProvider>) -> Result<()> {
    init_tracing();

    // Phase 1: load config, connect to the shared store, build state.
    let config = FluxgateConfig::load(&args.config_path)?;
    let listen = config.server.listen.clone();
    let admin_listen = config.server.admin_listen.clone();
    let state = FluxgateState::bootstrap(config, provider).await?;

    // Phase 2: start the admin server (health/readiness/metrics).
    let shutdown = Arc::new(Notify::new());
    start_admin_server(&state, &admin_listen);

    tracing::info!("server: starting fluxgate decision endpoint, listen={}", listen);

    let decision_handle = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move { server::run_decision_server(&listen, state, shutdown).await }
    });

    // Phase 3: block until signal, then clean up.
    wait_for_shutdown(&shutdown).await;

    // Graceful shutdown: stop the reload subscriber, then drain the decision server.
    state.shutdown().await;

    if let Err(e) = decision_handle.await {
        tracing::error!("server: decision task error: {}", e);
    }

    tracing::info!("server: shutdown complete");
    Ok(())
}

fn start_admin_server(state: &FluxgateState, admin_listen: &str) {
    let state = state.clone();
    let admin_addr = admin_listen.to_string();
    tokio::spawn(async move {
        if let Err(e) = server::run_admin_server(&admin_addr, state).await {
            tracing::error!("server: admin failed, error={}", e);
        }
    });
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }

    shutdown.notify_waiters();
}

fn init_tracing() {
    let (non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    std::mem::forget(_guard);
}
