use serde::Serialize;
use serde_json::Value;

/// Why a turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// The model answered without requesting another tool call.
    Completed,
    /// The step ceiling was reached.
    StepLimit,
    /// The caller aborted the turn.
    Cancelled,
}

/// Parts streamed to the client while a turn runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    StartStep,
    ReasoningStart { id: String },
    ReasoningDelta { id: String, delta: String },
    ReasoningEnd { id: String },
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable { tool_call_id: String, output: Value },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    #[serde(rename_all = "camelCase")]
    SourceUrl {
        source_id: String,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    FinishStep,
    #[serde(rename_all = "camelCase")]
    Finish { stop_reason: StopReason },
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

impl AgentEvent {
    /// Short name used for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            AgentEvent::Start { .. } => "start",
            AgentEvent::StartStep => "start-step",
            AgentEvent::ReasoningStart { .. } => "reasoning-start",
            AgentEvent::ReasoningDelta { .. } => "reasoning-delta",
            AgentEvent::ReasoningEnd { .. } => "reasoning-end",
            AgentEvent::TextStart { .. } => "text-start",
            AgentEvent::TextDelta { .. } => "text-delta",
            AgentEvent::TextEnd { .. } => "text-end",
            AgentEvent::ToolInputAvailable { .. } => "tool-input-available",
            AgentEvent::ToolOutputAvailable { .. } => "tool-output-available",
            AgentEvent::ToolOutputError { .. } => "tool-output-error",
            AgentEvent::SourceUrl { .. } => "source-url",
            AgentEvent::FinishStep => "finish-step",
            AgentEvent::Finish { .. } => "finish",
            AgentEvent::Error { .. } => "error",
        }
    }
}
