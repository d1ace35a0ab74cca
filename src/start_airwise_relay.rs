//! Startup helpers for the relay server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::server::{self, AppState};

/// Run the server until Ctrl-C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Airwise relay v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }

    let (state, port) = match initialize() {
        Ok(ready) => ready,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server_with_shutdown(state, port, shutdown_signal())) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

/// Load config and the system prompt, then build application state.
///
/// # Errors
/// Returns an error if configuration is invalid or the system prompt cannot be read.
pub fn initialize() -> RelayResult<(Arc<AppState>, u16)> {
    let config = RelayConfig::from_env()?;
    let system_prompt = load_system_prompt(&config)?;
    tracing::info!(
        telemetry = %config.telemetry.base_url,
        metadata = %config.sensors.metadata_url,
        model = %config.completion.model,
        "configuration loaded"
    );
    let state = AppState::new(&config, &system_prompt)?;
    Ok((state, config.server.port))
}

/// Read the system prompt once; it is immutable for the life of the process.
///
/// # Errors
/// Returns an error if the file cannot be read or is empty.
pub fn load_system_prompt(config: &RelayConfig) -> RelayResult<String> {
    let path = &config.server.system_prompt_path;
    let prompt = std::fs::read_to_string(path)?;
    if prompt.trim().is_empty() {
        return Err(RelayError::Config(format!(
            "system prompt file {} is empty",
            path.display()
        )));
    }
    tracing::info!("System prompt loaded from {} ({} bytes)", path.display(), prompt.len());
    Ok(prompt)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
