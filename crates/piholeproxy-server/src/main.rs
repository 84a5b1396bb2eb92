//! piholeproxy - a small web API in front of one or more Pi-hole instances.
//!
//! Keeps a Pi-hole session alive on every configured instance and forwards
//! client/group requests with those sessions, so the web UI never deals
//! with Pi-hole authentication.

mod routes;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use piholeproxy_core::{AdminProxy, AuthBackend, Config, PiholeClient, SessionManager};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use routes::AppState;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on session teardown at exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Log file prefix inside `LOG_DIR`
const LOG_FILE_PREFIX: &str = "piholeproxy.log";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Bind the listener, then open a session on every endpoint.
///
/// A bind failure returns before any backend session exists. The listener
/// accepts nothing until it is served.
async fn bind_and_connect<B: AuthBackend>(
    config: &Config,
    backend: B,
) -> Result<(TcpListener, Arc<SessionManager<B>>)> {
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    let sessions = SessionManager::connect_with_timeout(backend, config.endpoints(), config.request_timeout()).await;
    Ok((listener, sessions))
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let log_dir = std::env::var_os("LOG_DIR")
        .filter(|d| !d.is_empty())
        .map(PathBuf::from);
    let _log_guard = init_tracing(log_dir);
    info!("piholeproxy starting");

    let config = Config::load().context("Failed to load configuration")?;
    config.report();

    let api = PiholeClient::new(config.password.clone(), config.request_timeout())
        .context("Failed to build HTTP client")?;

    let (listener, sessions) = bind_and_connect(&config, api.clone()).await?;

    let shutdown = CancellationToken::new();
    let renewal = sessions.start(shutdown.clone());
    tokio::spawn(watch_signals(shutdown.clone()));

    let state = Arc::new(AppState {
        proxy: AdminProxy::new(Arc::clone(&sessions), api, config.group_ids()),
        shutdown: shutdown.clone(),
    });
    let app = routes::router(state, &config.static_dir);

    info!(
        addr = %config.listen_addr,
        call_timeout_secs = sessions.call_timeout().as_secs(),
        "Listening"
    );

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await;

    // Server is down (signal, /reboot or error): tear everything down
    shutdown.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, sessions.shutdown()).await.is_err() {
        warn!("Timed out ending Pi-hole sessions");
    }
    match tokio::time::timeout(SHUTDOWN_GRACE, renewal).await {
        Ok(Err(e)) => warn!(error = %e, "Session renewal task failed"),
        Err(_) => warn!("Session renewal task did not stop in time"),
        Ok(Ok(())) => {}
    }

    info!("piholeproxy shutting down");
    served.context("HTTP server failed")
}
