//! Inbound UI messages and their conversion into model messages plus
//! historical steps.

use serde::Deserialize;
use serde_json::Value;

use crate::llm::{ChatMessage, ToolCall};

use super::history::{Step, ToolInvocation};

const TOOL_PART_PREFIX: &str = "tool-";
const OUTPUT_AVAILABLE: &str = "output-available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    System,
    User,
    Assistant,
}

/// A message as the studio UI sends it.
///
/// `text` is shorthand for a single text part.
#[derive(Debug, Clone, Deserialize)]
pub struct UiMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: UiRole,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub parts: Vec<UiPart>,
}

/// One part of a UI message. Unknown part types are accepted and ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
}

impl UiPart {
    fn completed_invocation(&self) -> Option<ToolInvocation> {
        let name = self.kind.strip_prefix(TOOL_PART_PREFIX)?;
        if self.state.as_deref() != Some(OUTPUT_AVAILABLE) {
            return None;
        }
        Some(ToolInvocation {
            call_id: self.tool_call_id.clone()?,
            name: name.to_string(),
            input: self.input.clone().unwrap_or(Value::Null),
            output: self.output.clone()?,
        })
    }
}

/// Model-ready conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
    /// Steps reconstructed from prior assistant turns, oldest first.
    pub steps: Vec<Step>,
}

impl Conversation {
    pub fn from_ui_messages(messages: &[UiMessage]) -> Self {
        let mut conversation = Conversation::default();

        for message in messages {
            match message.role {
                UiRole::System => {
                    if let Some(text) = joined_text(message) {
                        conversation.messages.push(ChatMessage::system(text));
                    }
                }
                UiRole::User => {
                    if let Some(text) = joined_text(message) {
                        conversation.messages.push(ChatMessage::user(text));
                    }
                }
                UiRole::Assistant => conversation.push_assistant(message),
            }
        }

        conversation
    }

    /// An assistant message becomes one step per `step-start` boundary.
    fn push_assistant(&mut self, message: &UiMessage) {
        let mut current = Step {
            text: message.text.clone().filter(|t| !t.is_empty()),
            tool_invocations: Vec::new(),
        };

        for part in &message.parts {
            match part.kind.as_str() {
                "step-start" => {
                    let finished = std::mem::take(&mut current);
                    self.push_step(finished);
                }
                "text" => {
                    if let Some(text) = part.text.as_deref().filter(|t| !t.is_empty()) {
                        current.text.get_or_insert_with(String::new).push_str(text);
                    }
                }
                _ => {
                    if let Some(invocation) = part.completed_invocation() {
                        current.tool_invocations.push(invocation);
                    }
                }
            }
        }

        self.push_step(current);
    }

    fn push_step(&mut self, step: Step) {
        if step.text.is_none() && !step.has_tool_calls() {
            return;
        }

        let tool_calls = step
            .tool_invocations
            .iter()
            .map(|inv| ToolCall::new(&inv.call_id, &inv.name, inv.input.to_string()))
            .collect();
        self.messages
            .push(ChatMessage::assistant(step.text.clone(), tool_calls));
        for inv in &step.tool_invocations {
            self.messages
                .push(ChatMessage::tool_result(&inv.call_id, inv.output.to_string()));
        }

        self.steps.push(step);
    }
}

fn joined_text(message: &UiMessage) -> Option<String> {
    let mut text = message.text.clone().unwrap_or_default();
    for part in &message.parts {
        if part.kind == "text" {
            if let Some(t) = &part.text {
                text.push_str(t);
            }
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
