//! Listing watcher binary entrypoint.
//! Loads settings and highlight rules once, then runs the poll scheduler
//! until ctrl-c / SIGTERM.

use anyhow::Context;
use olx_watcher::highlight::config::load_engine_default;
use olx_watcher::scheduler::spawn_poll_scheduler;
use olx_watcher::{build_dispatcher, telemetry, WatchConfig};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler: {e:#}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler: {e:#}");
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    // Configuration errors stop the process before any polling.
    let cfg = WatchConfig::from_env().context("loading settings")?;
    let engine = load_engine_default().context("loading highlight rules")?;
    tracing::info!(?cfg, rules = engine.len(), "application is starting");

    let dispatcher = build_dispatcher(&cfg, engine).await?;
    let handle = spawn_poll_scheduler(dispatcher, cfg.poll_interval, shutdown_signal());
    handle.await.context("poll scheduler task")?;

    tracing::info!("stopped");
    Ok(())
}
