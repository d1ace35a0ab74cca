//! Chat completion providers.

pub mod openai;
pub mod types;

pub use openai::{RigCompletionProvider, openai_provider};
pub use types::{
    ChatMessage, CompletionFuture, CompletionProvider, CompletionReply, CompletionRequest, Role,
    ToolSpec,
};
