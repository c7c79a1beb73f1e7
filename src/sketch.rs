//! Sketch artifacts produced by the `generate_sketch` tool.
//!
//! A [`SketchOutput`] is immutable once produced: a modification request from
//! the user yields a brand-new sketch rather than an edit of an existing one.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Parameter ids every sketch must expose.
pub const REQUIRED_PARAM_IDS: [&str; 3] = ["canvasWidth", "canvasHeight", "seed"];

/// Inclusive bounds for a sketch seed.
pub const SEED_RANGE: std::ops::RangeInclusive<u64> = 1..=999_999;

/// UI control type for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Slider,
    Color,
    Number,
    Boolean,
    Select,
}

impl ParamType {
    fn is_numeric(self) -> bool {
        matches!(self, ParamType::Slider | ParamType::Number)
    }
}

/// Runtime value of a parameter.
///
/// Numbers keep their JSON representation so `42` renders back as `42`,
/// not `42.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

/// One tunable control rendered in the studio panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Variable name used inside the sketch's `params` object (camelCase).
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub value: ParamValue,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

impl Parameter {
    /// Whether `value` has the runtime type `kind` requires.
    pub fn value_matches_type(&self) -> bool {
        match (self.kind, &self.value) {
            (ParamType::Slider | ParamType::Number, ParamValue::Number(_)) => true,
            (ParamType::Color | ParamType::Select, ParamValue::Text(_)) => true,
            (ParamType::Boolean, ParamValue::Bool(_)) => true,
            _ => false,
        }
    }

    /// The value rendered as compact JSON, e.g. `800`, `"#ff0000"`, `true`.
    pub fn value_json(&self) -> String {
        // Serializing a plain enum of JSON scalars cannot fail.
        serde_json::to_string(&self.value).unwrap_or_default()
    }
}

/// A single generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchOutput {
    /// Complete, self-contained p5.js source.
    pub code: String,
    pub params: Vec<Parameter>,
    pub seed: u64,
    /// Short explanation shown to the user alongside the sketch.
    pub response: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SketchError {
    #[error("seed {0} is outside 1..=999999")]
    SeedOutOfRange(u64),

    #[error("parameter '{id}' declares type {kind:?} but its value does not match")]
    ValueTypeMismatch { id: String, kind: ParamType },

    #[error("parameter '{0}' sets min/max/step but is not a slider or number")]
    UnexpectedRange(String),

    #[error("parameter '{0}' sets options but is not a select")]
    UnexpectedOptions(String),

    #[error("required parameter '{0}' is missing")]
    MissingParam(&'static str),

    #[error("parameter id '{0}' is declared more than once")]
    DuplicateParam(String),
}

impl SketchOutput {
    /// Parse and validate a tool payload.
    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        let sketch: SketchOutput = serde_json::from_value(value)?;
        sketch.validate()?;
        Ok(sketch)
    }

    /// Check the structural invariants the UI relies on.
    pub fn validate(&self) -> Result<(), SketchError> {
        if !SEED_RANGE.contains(&self.seed) {
            return Err(SketchError::SeedOutOfRange(self.seed));
        }

        let mut seen = std::collections::HashSet::new();
        for param in &self.params {
            if !seen.insert(param.id.as_str()) {
                return Err(SketchError::DuplicateParam(param.id.clone()));
            }
            if !param.value_matches_type() {
                return Err(SketchError::ValueTypeMismatch {
                    id: param.id.clone(),
                    kind: param.kind,
                });
            }
            let has_range = param.min.is_some() || param.max.is_some() || param.step.is_some();
            if has_range && !param.kind.is_numeric() {
                return Err(SketchError::UnexpectedRange(param.id.clone()));
            }
            if param.options.is_some() && param.kind != ParamType::Select {
                return Err(SketchError::UnexpectedOptions(param.id.clone()));
            }
        }

        for id in REQUIRED_PARAM_IDS {
            if !seen.contains(id) {
                return Err(SketchError::MissingParam(id));
            }
        }

        Ok(())
    }

    /// Look up a parameter by id.
    pub fn param(&self, id: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.id == id)
    }
}

/// JSON schema for the `generate_sketch` tool input.
pub fn sketch_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "code": {
                "type": "string",
                "description": "Complete, self-contained p5.js code. Begin with a `params` object holding every tunable value, call randomSeed(params.seed) and noiseSeed(params.seed) in setup(), and read params.* wherever a value could be varied artistically."
            },
            "params": {
                "type": "array",
                "description": "UI controls for the sketch. Must include canvasWidth (slider, 400-1200), canvasHeight (slider, 400-1200) and seed (number, 1-999999). Add 5-15 controls covering colors, counts, sizes, speeds and behaviors.",
                "items": parameter_schema()
            },
            "seed": {
                "type": "integer",
                "minimum": 1,
                "maximum": 999999,
                "description": "Random seed for deterministic reproduction. Pick a random integer between 1 and 999999."
            },
            "response": {
                "type": "string",
                "description": "A brief, friendly explanation (2-4 sentences) of what the sketch does and the creative choices behind it."
            }
        },
        "required": ["code", "params", "seed", "response"],
        "additionalProperties": false
    })
}

fn parameter_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "string",
                "description": "camelCase variable name used in the params object, e.g. 'waveAmplitude'."
            },
            "label": {
                "type": "string",
                "description": "Human-readable label for the control, e.g. 'Wave Amplitude'."
            },
            "type": {
                "type": "string",
                "enum": ["slider", "color", "number", "boolean", "select"],
                "description": "slider for continuous values, color for hex colors, number for integers, boolean for toggles, select for options."
            },
            "value": {
                "type": ["number", "string", "boolean"],
                "description": "Initial value. Must match the type."
            },
            "min": { "type": ["number", "null"], "description": "Minimum for slider/number. Null otherwise." },
            "max": { "type": ["number", "null"], "description": "Maximum for slider/number. Null otherwise." },
            "step": { "type": ["number", "null"], "description": "Step for slider/number. Null otherwise." },
            "options": {
                "type": ["array", "null"],
                "items": { "type": "string" },
                "description": "Choices for select. Null otherwise."
            }
        },
        "required": ["id", "label", "type", "value", "min", "max", "step", "options"],
        "additionalProperties": false
    })
}
