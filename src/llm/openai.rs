//! OpenAI completion backend through Rig.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, ToolDefinition};
use rig::message::{AssistantContent, Message};
use rig::providers::openai;
use serde_json::json;
use tracing::debug;

use crate::config::CompletionConfig;
use crate::error::{RelayError, RelayResult};

use super::types::{
    ChatMessage, CompletionFuture, CompletionProvider, CompletionReply, CompletionRequest, Role,
};

/// Completion provider backed by any Rig completion model.
pub struct RigCompletionProvider<M> {
    model: M,
    model_name: String,
    timeout: Duration,
}

impl<M: CompletionModel> RigCompletionProvider<M> {
    /// Wrap a Rig model.
    #[must_use]
    pub fn new(model: M, model_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            timeout,
        }
    }
}

/// Build the OpenAI-backed provider from config.
///
/// Requests go to the chat-completions endpoint (`{base_url}/chat/completions`),
/// which OpenAI-compatible servers also expose.
///
/// # Errors
/// Returns an error if the base URL is invalid or the client cannot be built.
pub fn openai_provider(
    config: &CompletionConfig,
) -> RelayResult<Arc<dyn CompletionProvider>> {
    let builder = openai::Client::<ReqwestClient>::builder().api_key(config.api_key.clone());
    let builder = if let Some(base_url) = &config.base_url {
        builder.base_url(base_url)
    } else {
        builder
    };
    let client = builder
        .build()
        .map_err(|e| RelayError::Config(format!("openai client: {e}")))?;
    let model = client.completions_api().completion_model(config.model.clone());
    Ok(Arc::new(RigCompletionProvider::new(
        model,
        config.model.clone(),
        config.request_timeout,
    )))
}

impl<M> CompletionProvider for RigCompletionProvider<M>
where
    M: CompletionModel + 'static,
{
    fn complete(&self, request: CompletionRequest) -> CompletionFuture<'_, RelayResult<CompletionReply>> {
        Box::pin(async move {
            let prompt = RigPrompt::from_messages(request.messages)?;

            let mut builder = self
                .model
                .completion_request(prompt.last)
                .messages(prompt.history)
                .temperature(request.temperature)
                .max_tokens(request.max_tokens)
                .additional_params(json!({ "max_tokens": request.max_tokens }));
            if !prompt.preamble.is_empty() {
                builder = builder.preamble(prompt.preamble);
            }
            for tool in request.tools {
                builder = builder.tool(ToolDefinition {
                    name: tool.name,
                    description: tool.description,
                    parameters: tool.parameters,
                });
            }

            let response = tokio::time::timeout(self.timeout, self.model.completion(builder.build()))
                .await
                .map_err(|_| RelayError::Completion("completion timed out".to_string()))?
                .map_err(|e| RelayError::Completion(e.to_string()))?;

            let reply = extract_reply(&response.choice);
            debug!(
                model = %self.model_name,
                tool_calls = reply.tool_calls.len(),
                "completion received"
            );
            if reply.text.trim().is_empty() && reply.tool_calls.is_empty() {
                return Err(RelayError::Completion("empty reply".to_string()));
            }
            Ok(reply)
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Prompt split the way Rig expects it: system text as preamble, the final
/// turn as the prompt, earlier turns as history.
struct RigPrompt {
    preamble: String,
    history: Vec<Message>,
    last: Message,
}

impl RigPrompt {
    fn from_messages(messages: Vec<ChatMessage>) -> RelayResult<Self> {
        let mut system = Vec::new();
        let mut dialogue = Vec::new();
        for message in messages {
            match message.role {
                Role::System => system.push(message.content),
                Role::User => dialogue.push(Message::user(message.content)),
                Role::Assistant => dialogue.push(Message::assistant(message.content)),
            }
        }
        let last = dialogue.pop().ok_or_else(|| {
            RelayError::Completion("prompt has no user or assistant turn".to_string())
        })?;
        Ok(Self {
            preamble: system.join("\n\n"),
            history: dialogue,
            last,
        })
    }
}

fn extract_reply(choice: &rig::OneOrMany<AssistantContent>) -> CompletionReply {
    let mut reply = CompletionReply::default();
    for content in choice.iter() {
        match content {
            AssistantContent::Text(text) => reply.text.push_str(&text.text),
            AssistantContent::ToolCall(call) => reply.tool_calls.push(call.function.name.clone()),
            _ => {}
        }
    }
    reply
}
