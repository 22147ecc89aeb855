//! Startup helpers for the copilot backend server.

use std::process::ExitCode;

use anyhow::Context;

use crate::config::AppConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl-C (used by the `copilot-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting copilot backend v{}", env!("CARGO_PKG_VERSION"));

    match try_run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn try_run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        base_url = %config.gateway.base_url,
        model = %config.gateway.default_model,
        timeout_secs = config.gateway.request_timeout.as_secs(),
        "Upstream completion API configured"
    );

    let state = AppState::from_config(&config).context("Failed to create state")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(server::run_server_with_shutdown(
        state,
        &config.server,
        shutdown_signal(),
    ))
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
