//! # parley-agent
//!
//! parley bridge binary: loads settings, opens the session store, wires the
//! runtime to the `claude` CLI and serves HTTP until SIGINT/SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parley_conduit::ClaudeCli;
use parley_runtime::pruner::spawn_prune_task;
use parley_runtime::{AdmissionLimiter, Bridge, InvocationDefaults, ThreadSerializer};
use parley_server::shutdown::wait_for_signal;
use parley_server::{ParleyServer, ServerConfig};
use parley_sessions::SessionCache;
use parley_settings::BridgeSettings;

/// HTTP bridge to the claude CLI.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "HTTP bridge to the claude CLI")]
struct Cli {
    /// JSON settings file, deep-merged over the defaults.
    #[arg(long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings and `HOST`).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Resolve every settings layer: defaults, file, env, then flags.
    fn settings(&self) -> Result<BridgeSettings> {
        let mut settings = parley_settings::load_settings(self.config.as_deref())
            .context("failed to load settings")?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Loader warnings fire before the configured subscriber exists.
    let settings = tracing::subscriber::with_default(parley_core::logging::bootstrap_subscriber(), || {
        cli.settings()
    })?;

    parley_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let cache = Arc::new(
        SessionCache::open(&settings.sessions.path, settings.sessions.ttl())
            .with_context(|| format!("failed to open session store {}", settings.sessions.path))?,
    );

    let defaults = InvocationDefaults::from_settings(&settings.agent);
    tracing::info!(
        working_dir = %defaults.working_dir.display(),
        max_concurrent = settings.limits.max_concurrent,
        ttl_hours = settings.sessions.ttl_hours,
        "starting parley"
    );

    let bridge = Arc::new(Bridge::new(
        cache.clone(),
        Arc::new(ThreadSerializer::new()),
        AdmissionLimiter::new(settings.limits.max_concurrent),
        Arc::new(ClaudeCli::new(&settings.agent.binary)),
        defaults,
    ));

    let config = ServerConfig::from_settings(&settings);
    let grace = config.shutdown_grace;
    let server = ParleyServer::new(config, bridge);

    let pruner = spawn_prune_task(
        cache,
        settings.sessions.prune_interval(),
        server.shutdown().token(),
    );

    let (_addr, handle) = server.listen().await.context("failed to bind server")?;

    let signal = wait_for_signal()
        .await
        .context("failed to listen for shutdown signals")?;
    tracing::info!(signal, "shutting down");

    let clean = server
        .shutdown()
        .graceful_shutdown(vec![handle, pruner], grace)
        .await;

    tracing::info!(clean, "shutdown complete");
    Ok(())
}
