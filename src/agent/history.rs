//! Step history and active-sketch lookup.

use serde_json::Value;

use crate::sketch::SketchOutput;
use crate::tools::GENERATE_SKETCH;

/// A tool call that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    pub input: Value,
    pub output: Value,
}

/// One iteration of the agent loop, or its reconstruction from a prior
/// assistant message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub text: Option<String>,
    pub tool_invocations: Vec<ToolInvocation>,
}

impl Step {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_invocations.is_empty()
    }
}

/// The most recent `generate_sketch` output: highest step index first, then
/// highest call index within that step.
///
/// Outputs that no longer parse as a sketch are skipped.
pub fn extract_current_sketch(steps: &[Step]) -> Option<SketchOutput> {
    steps
        .iter()
        .rev()
        .flat_map(|step| step.tool_invocations.iter().rev())
        .filter(|invocation| invocation.name == GENERATE_SKETCH)
        .find_map(|invocation| serde_json::from_value(invocation.output.clone()).ok())
}
