//! minitrue: HTTP intercepting proxy.
//!
//! ```text
//!     Client ──▶ net::Listener ──▶ http::server ──▶ InboundRequestHandler
//!                                                      │ misdirect
//!                                                      │ mangle request
//!                                                      ▼
//!     Client ◀── replay / pass-through ◀── relay::RelayClient ◀──▶ Upstream
//!                      ▲
//!                      └── mangle response (only when configured)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use minitrue::config::{load_config, ConfigWatcher, ProxyConfig};
use minitrue::http::{Hooks, ProxyFactory, ProxyServer};
use minitrue::lifecycle::{wait_for_signal, Shutdown};
use minitrue::net::Listener;
use minitrue::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "minitrue")]
#[command(about = "HTTP intercepting proxy with misdirection and mangling hooks", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level, overriding `observability.log_level`.
    #[arg(long)]
    log_level: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    if cli.check {
        minitrue::config::validate_config(&config).map_err(|errors| {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        })?;
        println!("configuration ok");
        return Ok(());
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("minitrue v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let factory = Arc::new(ProxyFactory::from_config(&config)?);
    tracing::info!(hooks = ?factory.hooks(), "hooks installed");

    // Keep the watcher alive for the life of the process.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let factory = Arc::clone(&factory);
            let running = config.clone();
            tokio::spawn(async move {
                while let Some(next) = updates.recv().await {
                    if next.listener != running.listener
                        || next.timeouts != running.timeouts
                        || next.limits != running.limits
                    {
                        tracing::warn!("listener, timeout and limit changes need a restart; ignored");
                    }
                    match Hooks::from_config(&next) {
                        Ok(hooks) => factory.swap_hooks(hooks),
                        Err(e) => tracing::error!(error = %e, "reloaded config rejected"),
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    let listener = Listener::bind(&config.listener).await?;
    let server = ProxyServer::new(factory, Duration::from_secs(config.timeouts.drain_secs));

    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, stopped).await?;
    tracing::info!("shutdown complete");
    Ok(())
}
