//! CLI entry point (C14, §4.14).
//!
//! Grounded on the original project's `main.cpp`: parse arguments, load
//! configuration, wire up the singletons, run the `io_context` pool forever.
//! Replaces the source's singleton wiring (`McpCache::GetInstance()`,
//! `PluginManager::GetInstance()`) with explicit construction of an
//! [`mcpd_server::AppState`] (§9 Design Notes) threaded through to the
//! listener(s), and its blocking `io_service.run()` call with two
//! [`mcpd_transport::Listener`]/[`mcpd_transport::TlsListener`] accept loops
//! raced against a `tokio::signal`-driven shutdown.

mod config;
mod logging;
mod tls;
mod tools;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mcpd_core::SessionCache;
use mcpd_plugin::ToolRegistry;
use mcpd_server::{reaper, AppState, McpDispatcher};
use mcpd_transport::{Listener, TlsListener};

/// MCP streamable-HTTP server.
#[derive(Parser, Debug)]
#[command(name = "mcpd", version, about = "MCP streamable-HTTP server")]
struct Cli {
    /// Path to a TOML configuration file. Defaults to `config.toml` in the
    /// working directory if present, otherwise built-in defaults.
    #[arg(short, long)]
    config: Option<String>,

    /// Override `server.bind_address` from the command line.
    #[arg(long)]
    bind_address: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(bind_address) = cli.bind_address {
        match bind_address.parse() {
            Ok(addr) => config.bind_address = addr,
            Err(_) => {
                eprintln!("startup failed: invalid --bind-address {bind_address}");
                return ExitCode::FAILURE;
            }
        }
    }

    let _logging_guard = match logging::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.io_pool_threads)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: config::Config) -> anyhow::Result<()> {
    let registry = Arc::new(ToolRegistry::new());
    tools::register_builtins(&registry);

    let sessions = SessionCache::new(config.max_sessions, config.max_events_per_session, config.session_ttl);
    let state = Arc::new(AppState::new(Arc::clone(&registry), sessions.clone()));

    let reaper_handle = reaper::spawn(state.generators.clone(), sessions.clone(), reaper::REAP_INTERVAL);

    let dispatcher = Arc::new(McpDispatcher::new(Arc::clone(&state)));

    let mut http_listener = None;
    if config.http_port != 0 {
        let addr = SocketAddr::new(config.bind_address, config.http_port);
        let listener = Listener::bind(addr, config.io_pool_threads).await?;
        tracing::info!(%addr, "listening (http)");
        http_listener = Some(listener);
    }

    let mut https_listener = None;
    if config.https_port != 0 {
        let acceptor = tls::build_acceptor(&config)?;
        let addr = SocketAddr::new(config.bind_address, config.https_port);
        let listener = TlsListener::bind(addr, acceptor, config.io_pool_threads).await?;
        tracing::info!(%addr, "listening (https)");
        https_listener = Some(listener);
    }

    if http_listener.is_none() && https_listener.is_none() {
        anyhow::bail!("neither http_port nor https_port is enabled");
    }

    let shutdown = state.shutdown.clone();
    tokio::spawn(wait_for_shutdown_signal(shutdown));

    tokio::select! {
        () = state.shutdown.cancelled() => {
            tracing::info!("shutdown signal received, stopping accept loops");
        }
        err = serve_forever(http_listener, https_listener, dispatcher) => {
            tracing::error!(%err, "listener exited unexpectedly");
        }
    }

    reaper_handle.stop().await;
    Ok(())
}

async fn serve_forever(
    http_listener: Option<Listener>,
    https_listener: Option<TlsListener>,
    dispatcher: Arc<McpDispatcher>,
) -> mcpd_transport::TransportError {
    match (http_listener, https_listener) {
        (Some(http), Some(https)) => {
            tokio::select! {
                err = http.serve(Arc::clone(&dispatcher)) => err,
                err = https.serve(dispatcher) => err,
            }
        }
        (Some(http), None) => http.serve(dispatcher).await,
        (None, Some(https)) => https.serve(dispatcher).await,
        (None, None) => unreachable!("checked by caller"),
    }
}

/// Waits for `SIGINT` or `SIGTERM` (unix) and cancels `shutdown` (§4.14
/// "stop accepting new connections ... on SIGINT/SIGTERM").
async fn wait_for_shutdown_signal(shutdown: tokio_util::sync::CancellationToken) {
    #[cfg(unix)]
    {
        let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    shutdown.cancel();
}
