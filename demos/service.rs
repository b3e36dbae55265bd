use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::signal;
use tracing::{error, info, warn};

use tracing_error_hook::dsn::TransportConfig;
use tracing_error_hook::env::{env_opt, env_or, ERROR_HOOK_LEVELS_ENV, LISTEN_ADDR_ENV};
use tracing_error_hook::hook::Hook;
use tracing_error_hook::init::init_tracing;
use tracing_error_hook::panic::install_panic_hook;
use tracing_error_hook::server::{Lifecycle, ServerConfig};
use tracing_error_hook::severity::{parse_levels, Severity};
use tracing_error_hook::stacktrace::TracedError;

/// Resolves on SIGTERM or ctrl-c.
async fn termination() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn router() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/fail",
            get(|| async {
                let err = TracedError::new("connection refused");
                error!(error = &err as &(dyn std::error::Error + 'static), "db timeout");
                "reported"
            }),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TransportConfig::from_env();

    let levels = match env_opt(ERROR_HOOK_LEVELS_ENV) {
        Some(list) => parse_levels(&list)?,
        None => vec![Severity::Panic, Severity::Fatal, Severity::Error],
    };
    let hook = Hook::new(&config, &levels)?;
    init_tracing(hook.clone())?;
    install_panic_hook(hook.clone());
    // The hook warned about this before any subscriber was installed.
    if !config.reporting_enabled() {
        warn!("no DSN provided, error reporting is disabled");
    }
    if config.environment.is_none() {
        warn!("environment is not set, events carry no environment");
    }

    let addr: SocketAddr = env_or(LISTEN_ADDR_ENV, "0.0.0.0:8000").parse()?;
    let lifecycle = Arc::new(Lifecycle::new(router(), ServerConfig::new(addr)));
    let serving = lifecycle.start();

    match lifecycle.ready().await {
        Some(addr) => info!(%addr, "server running..."),
        None => warn!("server did not start, waiting for termination anyway"),
    }

    termination().await;
    info!("interrupt signal captured: shutting down");

    if let Err(e) = lifecycle.shutdown_timeout(Duration::from_secs(10)).await {
        error!(error = %e, "server did not shut down cleanly");
    }
    if let Err(e) = serving.await {
        error!(error = %e, "listener task failed");
    }
    if !hook.flush(Duration::from_secs(2)).await {
        warn!("not every event was delivered before exit");
    }

    info!("server shut down");
    Ok(())
}
