//! Application state shared across all request handlers.

use std::sync::Arc;

use tracing::info;

use crate::chat::{Orchestrator, SamplingParams};
use crate::config::RelayConfig;
use crate::dashboard::DashboardAggregator;
use crate::error::RelayResult;
use crate::llm::{CompletionProvider, openai_provider};
use crate::sensors::SensorMetadataClient;
use crate::telemetry::TelemetrySession;

/// Shared application state.
pub struct AppState {
    /// Conversation orchestrator; owns the telemetry session.
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Wire the production collaborators from config.
    ///
    /// # Errors
    /// Returns an error if any upstream client cannot be created.
    pub fn new(config: &RelayConfig, system_prompt: &str) -> RelayResult<Arc<Self>> {
        let provider = openai_provider(&config.completion)?;
        info!(model = provider.model_name(), "completion provider ready");
        let state = Self::with_provider(config, system_prompt, provider)?;
        Ok(Arc::new(state))
    }

    /// Wire the upstream data clients from config around an explicit provider.
    ///
    /// # Errors
    /// Returns an error if the telemetry or metadata client cannot be created.
    pub fn with_provider(
        config: &RelayConfig,
        system_prompt: &str,
        provider: Arc<dyn CompletionProvider>,
    ) -> RelayResult<Self> {
        let telemetry = Arc::new(TelemetrySession::new(&config.telemetry)?);
        let sensors = Arc::new(SensorMetadataClient::new(&config.sensors)?);
        let aggregator = DashboardAggregator::new(telemetry, sensors);
        let sampling = SamplingParams {
            max_tokens: config.completion.max_tokens,
            temperature: config.completion.temperature,
        };

        Ok(Self {
            orchestrator: Orchestrator::new(provider, aggregator, system_prompt, sampling),
        })
    }
}
