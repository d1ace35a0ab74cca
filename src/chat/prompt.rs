//! Prompt fragments for the dashboard-data tool round.

use serde_json::json;

use crate::dashboard::DashboardData;
use crate::error::{RelayError, RelayResult};
use crate::llm::{ChatMessage, ToolSpec};

/// Name of the only tool the model can request.
pub const DASHBOARD_TOOL: &str = "getDashboardData";

/// Text marker accepted from providers that do not emit structured tool calls.
pub const DASHBOARD_TOOL_MARKER: &str = "CALL FUNCTION getDashboardData";

const DASHBOARD_TOOL_DESCRIPTION: &str = "This function returns the data for the dashboard about the sensor data, location, and other details about air quality activity in real-time";

/// Structured definition of the dashboard-data tool. It takes no arguments;
/// the sensor comes from the request.
#[must_use]
pub fn dashboard_tool() -> ToolSpec {
    ToolSpec {
        name: DASHBOARD_TOOL.to_string(),
        description: DASHBOARD_TOOL_DESCRIPTION.to_string(),
        parameters: json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    }
}

/// Ephemeral instruction appended during the deciding round.
#[must_use]
pub fn tool_instruction() -> ChatMessage {
    ChatMessage::system(format!(
        "You can call a function named \"{DASHBOARD_TOOL}\" if you need to retrieve data about the dashboard, sensor data, and air quality. If you need to call this function, simply reply with \"{DASHBOARD_TOOL_MARKER}\"."
    ))
}

/// Ephemeral system message carrying the fetched data into the second round.
///
/// # Errors
/// Returns `RelayError::Completion` if the data cannot be serialized.
pub fn tool_result(data: &DashboardData) -> RelayResult<ChatMessage> {
    let serialized = serde_json::to_string(data)
        .map_err(|e| RelayError::Completion(format!("cannot serialize dashboard data: {e}")))?;
    Ok(ChatMessage::system(format!(
        "The function \"{DASHBOARD_TOOL}\" has been called and the data is available. Here is the data: {serialized}. You can now proceed to generate the required response based on this data."
    )))
}
