//! Provider-neutral chat completion types.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;

use crate::error::RelayResult;

/// Boxed future type for completion operations.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions from the relay.
    System,
    /// End user.
    User,
    /// Model reply.
    Assistant,
}

/// One message of a prompt. Order within a prompt is significant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Function the model may ask the relay to run.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    /// Function name.
    pub name: String,
    /// What the function returns.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

/// One completion call.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// Ordered prompt.
    pub messages: Vec<ChatMessage>,
    /// Tools offered to the model; empty for plain completions.
    pub tools: Vec<ToolSpec>,
    /// Output token bound.
    pub max_tokens: u64,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Model reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionReply {
    /// Concatenated text content.
    pub text: String,
    /// Names of the tools the model asked to call.
    pub tool_calls: Vec<String>,
}

impl CompletionReply {
    /// Plain text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Whether the reply asks for `tool`, either structurally or via `marker` in the text.
    #[must_use]
    pub fn requests_tool(&self, tool: &str, marker: &str) -> bool {
        self.tool_calls.iter().any(|name| name == tool) || self.text.contains(marker)
    }
}

/// Chat completion backend.
pub trait CompletionProvider: Send + Sync {
    /// Run one completion.
    ///
    /// # Errors
    /// Returns `RelayError::Completion` if the call fails, times out, or the
    /// reply is unusable.
    fn complete(&self, request: CompletionRequest) -> CompletionFuture<'_, RelayResult<CompletionReply>>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}
