//! Two-round conversation orchestration.
//!
//! Round one asks the model whether it needs dashboard data. If it does, the
//! data is fetched once and round two answers with the data in context. The
//! tool is never offered again in round two.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::dashboard::{DashboardAggregator, DashboardData};
use crate::error::RelayResult;
use crate::llm::{ChatMessage, CompletionProvider, CompletionReply, CompletionRequest};

use super::prompt::{
    DASHBOARD_TOOL, DASHBOARD_TOOL_MARKER, dashboard_tool, tool_instruction, tool_result,
};
use super::request::Conversation;

/// Endpoint-facing result: `{ msg, data? }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatOutcome {
    /// Final model reply.
    pub msg: String,
    /// Dashboard data, present only when the tool was invoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DashboardData>,
}

/// Outcome of the deciding round.
#[derive(Debug)]
enum Decision {
    /// The reply answers the user directly.
    Direct(String),
    /// The model asked for dashboard data.
    ToolAugmented,
}

/// Sampling bounds shared by both rounds.
#[derive(Clone, Copy, Debug)]
pub struct SamplingParams {
    /// Output token bound.
    pub max_tokens: u64,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.7,
        }
    }
}

/// Drives one conversation through the deciding and responding rounds.
pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    aggregator: DashboardAggregator,
    system_prompt: Arc<str>,
    sampling: SamplingParams,
}

impl Orchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        aggregator: DashboardAggregator,
        system_prompt: impl Into<Arc<str>>,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            provider,
            aggregator,
            system_prompt: system_prompt.into(),
            sampling,
        }
    }

    /// Answer a validated conversation.
    ///
    /// # Errors
    /// Returns the completion error of either round, or the aggregation error
    /// when the model asked for data. No fallback reply is produced.
    pub async fn respond(&self, conversation: &Conversation) -> RelayResult<ChatOutcome> {
        let base = self.base_messages(conversation);

        match self.decide(&base).await? {
            Decision::Direct(msg) => {
                info!(sensor = %conversation.sensor, "answered without dashboard data");
                Ok(ChatOutcome { msg, data: None })
            }
            Decision::ToolAugmented => {
                info!(
                    sensor = %conversation.sensor,
                    tool = DASHBOARD_TOOL,
                    "model requested dashboard data"
                );
                let data = self.aggregator.aggregate(&conversation.sensor).await?;

                let mut messages = base;
                messages.push(tool_result(&data)?);
                let reply = self.complete(messages, false).await?;
                if reply.requests_tool(DASHBOARD_TOOL, DASHBOARD_TOOL_MARKER) {
                    warn!("model requested the tool again; single round only, returning reply as is");
                }

                Ok(ChatOutcome {
                    msg: reply.text,
                    data: Some(data),
                })
            }
        }
    }

    /// System prompt followed by the client turns.
    fn base_messages(&self, conversation: &Conversation) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(conversation.messages.len() + 2);
        messages.push(ChatMessage::system(&*self.system_prompt));
        messages.extend(conversation.messages.iter().cloned());
        messages
    }

    async fn decide(&self, base: &[ChatMessage]) -> RelayResult<Decision> {
        let mut messages = base.to_vec();
        messages.push(tool_instruction());
        let reply = self.complete(messages, true).await?;

        if reply.requests_tool(DASHBOARD_TOOL, DASHBOARD_TOOL_MARKER) {
            Ok(Decision::ToolAugmented)
        } else {
            Ok(Decision::Direct(reply.text))
        }
    }

    async fn complete(&self, messages: Vec<ChatMessage>, offer_tool: bool) -> RelayResult<CompletionReply> {
        let request = CompletionRequest {
            messages,
            tools: if offer_tool { vec![dashboard_tool()] } else { Vec::new() },
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
        };
        self.provider.complete(request).await.inspect_err(|e| {
            warn!(model = self.provider.model_name(), "completion failed: {e}");
        })
    }
}
