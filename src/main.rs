#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::Parser;
use fluxgate::cache::{FileRuleSetProvider, RuleSetProvider, StaticRuleSetProvider};
use fluxgate::server;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fluxgate-server", about = "Distributed rate-limiting decision service")]
struct Cli {
    /// Path to fluxgate config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// JSON file of rule-sets to serve. With no control-store integration
    /// wired in, this is the provider the standalone binary falls back to.
    #[arg(long)]
    rule_sets: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let worker_threads = server::runtime::get_container_cpu_limit();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    let provider: Arc<dyn RuleSetProvider> = match &cli.rule_sets {
        Some(path) => Arc::new(FileRuleSetProvider::load(path)?),
        None => {
            tracing::warn!("no --rule-sets file given, starting with an empty rule-set provider");
            Arc::new(StaticRuleSetProvider::new())
        }
    };

    rt.block_on(server::bootstrap::run(
        server::bootstrap::BootstrapArgs { config_path: cli.config },
        provider,
    ))
}
