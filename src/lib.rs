//! # Seed
//!
//! A conversational generative-art agent: describe a visual idea in plain
//! language and get back a runnable p5.js sketch with tunable parameters.
//!
//! This library provides:
//! - An HTTP API that streams agent turns as server-sent events
//! - A bounded tool loop driving an OpenAI chat model
//! - Active-sketch tracking, so "make it faster" edits the last sketch
//!
//! ## Architecture
//!
//! Each turn follows the "tools in a loop" pattern:
//! 1. Receive the conversation via the API
//! 2. Attach the most recent sketch (if any) to the fixed system prompt
//! 3. Call the LLM, execute `generate_sketch` / `web_search` calls
//! 4. Feed results back, repeat until done or 10 steps have run
//!
//! ## Example
//!
//! ```rust,ignore
//! use seed::{agent::AgentFactory, config::Config};
//!
//! let config = Config::from_env()?;
//! let agents = AgentFactory::from_config(&config)?;
//! let agent = agents.create_agent()?;
//! let summary = agent.run(&messages, &events_tx, &cancel).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod sketch;
pub mod tools;

pub use config::Config;
