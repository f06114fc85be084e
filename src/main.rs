//! Edge router daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   providers (file, inline)
//!       → aggregator → snapshot → compile → RouterTable (ArcSwap)
//!                                                │
//!   Client ─▶ listener ─▶ entry point ─▶ matcher + middleware chain
//!                                                │
//!   Client ◀──────────────────────────────── dispatch ◀── Upstream
//!
//!   lifecycle: Starting → Running → Draining → Stopped
//!   health (/ping), admin API (/api), logging + metrics
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use edge_router::config::{load_config, StaticConfig};
use edge_router::lifecycle::LifecycleManager;
use edge_router::observability::logging;

#[derive(Parser)]
#[command(name = "edge-router", version)]
#[command(about = "Edge router with hot-reloaded routing and graceful shutdown", long_about = None)]
struct Cli {
    /// Static configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "EDGE_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => StaticConfig::default(),
    };
    if cli.check {
        println!("configuration ok");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init(&config.log) {
        eprintln!("error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-router starting");

    let mut proxy = match LifecycleManager::new(config).start().await {
        Ok(proxy) => proxy,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    proxy.listen_for_signals();
    proxy.stopped().await;

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
