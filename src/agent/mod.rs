//! Agent module - the Seed sketch orchestrator.
//!
//! Each turn follows a "tools in a loop" pattern:
//! 1. Rebuild model messages and prior steps from the conversation
//! 2. Derive the step's instructions, attaching the active sketch if one exists
//! 3. Call the LLM with `generate_sketch` and `web_search`
//! 4. Execute requested tools and feed results back
//! 5. Repeat until no tool is requested or the step ceiling is reached

mod agent_loop;
mod conversation;
mod events;
mod factory;
mod history;
mod prompt;

pub use agent_loop::{AgentError, AgentSettings, SeedAgent, TurnSummary, AGENT_SETTINGS, MAX_STEPS};
pub use conversation::{Conversation, UiMessage, UiPart, UiRole};
pub use events::{AgentEvent, StopReason};
pub use factory::AgentFactory;
pub use history::{extract_current_sketch, Step, ToolInvocation};
pub use prompt::{build_sketch_context, instructions_for_step, SEED_INSTRUCTIONS};
