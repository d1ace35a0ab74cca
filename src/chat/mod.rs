//! Conversation handling: request validation, prompt fragments and the
//! two-round orchestrator.

pub mod orchestrator;
pub mod prompt;
pub mod request;

pub use orchestrator::{ChatOutcome, Orchestrator, SamplingParams};
pub use prompt::{DASHBOARD_TOOL, DASHBOARD_TOOL_MARKER};
pub use request::{Conversation, GenerateRequest};
