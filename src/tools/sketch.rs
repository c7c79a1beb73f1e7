//! The `generate_sketch` tool.

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolOutput};
use crate::sketch::{sketch_output_schema, SketchOutput};

pub const GENERATE_SKETCH: &str = "generate_sketch";

/// Forces the model to emit a validated [`SketchOutput`] instead of free text.
/// Execution is identity: the parsed input is the output.
pub struct GenerateSketch;

#[async_trait]
impl Tool for GenerateSketch {
    fn name(&self) -> &str {
        GENERATE_SKETCH
    }

    fn description(&self) -> &str {
        "Generate or modify a p5.js sketch with full code and UI parameters. Use it when the user requests new generative art, wants to change an existing sketch, or wants to iterate on a design. The sketch must run immediately and be visually interesting."
    }

    fn parameters_schema(&self) -> Value {
        sketch_output_schema()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutput> {
        let sketch = SketchOutput::from_value(args)
            .map_err(|e| anyhow::anyhow!("Invalid sketch: {}", e))?;
        tracing::debug!(
            seed = sketch.seed,
            params = sketch.params.len(),
            code_len = sketch.code.len(),
            "Sketch generated"
        );
        Ok(ToolOutput::new(serde_json::to_value(&sketch)?))
    }
}
