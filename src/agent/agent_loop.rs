//! Core agent loop implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::API_KEY_ENV;
use crate::llm::{
    ChatMessage, CompletionDelta, CompletionRequest, LlmClient, ReasoningEffort,
    SearchContextSize, ToolCall,
};
use crate::sketch::SketchOutput;
use crate::tools::ToolRegistry;

use super::conversation::{Conversation, UiMessage};
use super::events::{AgentEvent, StopReason};
use super::history::{extract_current_sketch, Step, ToolInvocation};
use super::prompt::{instructions_for_step, SEED_INSTRUCTIONS};

/// Fixed agent behavior. Seed is a single product, not a model picker.
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub model: &'static str,
    /// Sent only to models that accept it.
    pub reasoning_effort: ReasoningEffort,
    pub web_search_enabled: bool,
    pub search_model: &'static str,
    pub search_context_size: SearchContextSize,
    /// Hard ceiling on model calls per turn.
    pub max_steps: usize,
}

pub const MAX_STEPS: usize = 10;

pub const AGENT_SETTINGS: AgentSettings = AgentSettings {
    model: "gpt-4o-mini",
    reasoning_effort: ReasoningEffort::Low,
    web_search_enabled: true,
    search_model: "gpt-4o-mini-search-preview",
    search_context_size: SearchContextSize::Low,
    max_steps: MAX_STEPS,
};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("The {} environment variable is not set", API_KEY_ENV)]
    MissingCredential,

    #[error("Model provider error: {0:#}")]
    Provider(anyhow::Error),
}

/// Outcome of one conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    /// Steps executed in this turn.
    pub steps: usize,
    pub stop_reason: StopReason,
    /// Newest sketch generated during this turn, if any.
    pub sketch: Option<SketchOutput>,
}

/// The Seed agent: fixed instructions, a tool registry and a bounded loop.
pub struct SeedAgent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl SeedAgent {
    pub(crate) fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run one turn, streaming parts into `events`.
    ///
    /// A step is committed to history only after every tool call in it
    /// finished, so cancellation never leaves a partial sketch behind.
    pub async fn run(
        &self,
        ui_messages: &[UiMessage],
        events: &mpsc::UnboundedSender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<TurnSummary, AgentError> {
        let Conversation {
            mut messages,
            mut steps,
        } = Conversation::from_ui_messages(ui_messages);
        let turn_start = steps.len();
        let tool_schemas = self.tools.get_tool_schemas();

        let message_id = Uuid::new_v4().to_string();
        emit(events, AgentEvent::Start { message_id });

        let mut stop_reason = StopReason::StepLimit;

        for step_index in 0..self.settings.max_steps {
            if cancel.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            tracing::debug!(step = step_index + 1, history = steps.len(), "Agent step");

            let instructions = instructions_for_step(SEED_INSTRUCTIONS, &steps);
            emit(events, AgentEvent::StartStep);

            let parts = StepParts::new(events, step_index);
            let on_delta = |delta: CompletionDelta| parts.push(delta);

            let request = CompletionRequest {
                model: self.settings.model,
                reasoning_effort: Some(self.settings.reasoning_effort),
                instructions: &instructions,
                messages: &messages,
                tools: &tool_schemas,
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.llm.complete(request, &on_delta) => Some(result),
            };
            parts.close();
            let Some(result) = result else {
                stop_reason = StopReason::Cancelled;
                break;
            };
            let completion = result.map_err(AgentError::Provider)?;
            tracing::debug!(
                step = step_index + 1,
                finish_reason = completion.finish_reason.as_deref().unwrap_or("unknown"),
                tool_calls = completion.tool_calls.len(),
                usage = ?completion.usage,
                "Model call finished"
            );

            if completion.tool_calls.is_empty() {
                messages.push(ChatMessage::assistant(completion.content.clone(), Vec::new()));
                steps.push(Step {
                    text: completion.content,
                    tool_invocations: Vec::new(),
                });
                emit(events, AgentEvent::FinishStep);
                stop_reason = StopReason::Completed;
                break;
            }

            let Some((invocations, tool_messages)) =
                self.run_tool_calls(&completion.tool_calls, events, cancel).await
            else {
                stop_reason = StopReason::Cancelled;
                break;
            };

            messages.push(ChatMessage::assistant(
                completion.content.clone(),
                completion.tool_calls,
            ));
            messages.extend(tool_messages);
            steps.push(Step {
                text: completion.content,
                tool_invocations: invocations,
            });
            emit(events, AgentEvent::FinishStep);
        }

        let steps_taken = steps.len() - turn_start;
        tracing::info!(steps = steps_taken, stop_reason = ?stop_reason, "Agent turn finished");
        emit(events, AgentEvent::Finish { stop_reason });

        Ok(TurnSummary {
            steps: steps_taken,
            stop_reason,
            sketch: extract_current_sketch(&steps[turn_start..]),
        })
    }

    /// Execute a step's tool calls in order. Returns `None` if cancelled.
    async fn run_tool_calls(
        &self,
        tool_calls: &[ToolCall],
        events: &mpsc::UnboundedSender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Option<(Vec<ToolInvocation>, Vec<ChatMessage>)> {
        let mut invocations = Vec::new();
        let mut tool_messages = Vec::new();

        for call in tool_calls {
            let name = call.function.name.as_str();
            let input = serde_json::from_str::<Value>(&call.function.arguments);

            emit(
                events,
                AgentEvent::ToolInputAvailable {
                    tool_call_id: call.id.clone(),
                    tool_name: name.to_string(),
                    input: input.as_ref().cloned().unwrap_or(Value::Null),
                },
            );

            let outcome = match input {
                Ok(input) => {
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        result = self.tools.execute(name, input.clone()) => Some(result),
                    };
                    result?.map(|output| (input, output))
                }
                Err(e) => Err(anyhow::anyhow!("Tool arguments are not valid JSON: {}", e)),
            };

            match outcome {
                Ok((input, output)) => {
                    tracing::debug!(tool = name, call_id = %call.id, "Tool call completed");
                    for source in &output.sources {
                        emit(
                            events,
                            AgentEvent::SourceUrl {
                                source_id: Uuid::new_v4().to_string(),
                                url: source.url.clone(),
                                title: source.title.clone(),
                            },
                        );
                    }
                    emit(
                        events,
                        AgentEvent::ToolOutputAvailable {
                            tool_call_id: call.id.clone(),
                            output: output.value.clone(),
                        },
                    );
                    tool_messages
                        .push(ChatMessage::tool_result(&call.id, output.value.to_string()));
                    invocations.push(ToolInvocation {
                        call_id: call.id.clone(),
                        name: name.to_string(),
                        input,
                        output: output.value,
                    });
                }
                Err(e) => {
                    tracing::warn!(tool = name, call_id = %call.id, error = %e, "Tool call failed");
                    let error_text = format!("{:#}", e);
                    tool_messages.push(ChatMessage::tool_result(
                        &call.id,
                        json!({ "error": error_text }).to_string(),
                    ));
                    emit(
                        events,
                        AgentEvent::ToolOutputError {
                            tool_call_id: call.id.clone(),
                            error_text,
                        },
                    );
                }
            }
        }

        Some((invocations, tool_messages))
    }
}

/// Text and reasoning parts of one step. Each opens on its first delta and
/// is closed once the model call ends.
struct StepParts<'a> {
    events: &'a mpsc::UnboundedSender<AgentEvent>,
    text_id: String,
    reasoning_id: String,
    text_open: AtomicBool,
    reasoning_open: AtomicBool,
}

impl<'a> StepParts<'a> {
    fn new(events: &'a mpsc::UnboundedSender<AgentEvent>, step_index: usize) -> Self {
        Self {
            events,
            text_id: format!("text-{}", step_index),
            reasoning_id: format!("reasoning-{}", step_index),
            text_open: AtomicBool::new(false),
            reasoning_open: AtomicBool::new(false),
        }
    }

    fn push(&self, delta: CompletionDelta) {
        match delta {
            CompletionDelta::Text(delta) => {
                if !self.text_open.swap(true, Ordering::Relaxed) {
                    emit(self.events, AgentEvent::TextStart { id: self.text_id.clone() });
                }
                emit(
                    self.events,
                    AgentEvent::TextDelta {
                        id: self.text_id.clone(),
                        delta,
                    },
                );
            }
            CompletionDelta::Reasoning(delta) => {
                if !self.reasoning_open.swap(true, Ordering::Relaxed) {
                    emit(
                        self.events,
                        AgentEvent::ReasoningStart {
                            id: self.reasoning_id.clone(),
                        },
                    );
                }
                emit(
                    self.events,
                    AgentEvent::ReasoningDelta {
                        id: self.reasoning_id.clone(),
                        delta,
                    },
                );
            }
        }
    }

    fn close(&self) {
        if self.reasoning_open.swap(false, Ordering::Relaxed) {
            emit(
                self.events,
                AgentEvent::ReasoningEnd {
                    id: self.reasoning_id.clone(),
                },
            );
        }
        if self.text_open.swap(false, Ordering::Relaxed) {
            emit(self.events, AgentEvent::TextEnd { id: self.text_id.clone() });
        }
    }
}

/// A closed receiver means the client went away; cancellation handles that.
fn emit(events: &mpsc::UnboundedSender<AgentEvent>, event: AgentEvent) {
    if events.send(event).is_err() {
        tracing::trace!("Event receiver dropped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::factory::AgentFactory;
    use crate::llm::{Completion, DeltaSink, SearchAnswer};
    use crate::sketch::tests::sample_sketch;
    use crate::tools::{SearchClient, GENERATE_SKETCH, WEB_SEARCH};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records the instructions of each call.
    pub(crate) struct ScriptedLlm {
        responses: Mutex<VecDeque<Completion>>,
        repeat: Option<Completion>,
        pub(crate) instructions: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(responses: Vec<Completion>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                repeat: None,
                instructions: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn repeating(completion: Completion) -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                repeat: Some(completion),
                instructions: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.instructions.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            request: CompletionRequest<'_>,
            on_delta: DeltaSink<'_>,
        ) -> anyhow::Result<Completion> {
            self.instructions
                .lock()
                .unwrap()
                .push(request.instructions.to_string());
            let next = self.responses.lock().unwrap().pop_front();
            let completion = next
                .or_else(|| self.repeat.clone())
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;
            if let Some(text) = &completion.content {
                on_delta(CompletionDelta::Text(text.clone()));
            }
            Ok(completion)
        }
    }

    struct HangingLlm;

    #[async_trait]
    impl LlmClient for HangingLlm {
        async fn complete(
            &self,
            _request: CompletionRequest<'_>,
            _on_delta: DeltaSink<'_>,
        ) -> anyhow::Result<Completion> {
            std::future::pending().await
        }
    }

    struct HangingSearch;

    #[async_trait]
    impl SearchClient for HangingSearch {
        async fn search(
            &self,
            _query: &str,
            _context_size: SearchContextSize,
        ) -> anyhow::Result<SearchAnswer> {
            std::future::pending().await
        }
    }

    /// Streams reasoning before text, like a reasoning-capable provider.
    struct ThinkingLlm;

    #[async_trait]
    impl LlmClient for ThinkingLlm {
        async fn complete(
            &self,
            _request: CompletionRequest<'_>,
            on_delta: DeltaSink<'_>,
        ) -> anyhow::Result<Completion> {
            on_delta(CompletionDelta::Reasoning("a circle".into()));
            on_delta(CompletionDelta::Text("Hel".into()));
            on_delta(CompletionDelta::Text("lo".into()));
            Ok(text_completion("Hello"))
        }
    }

    fn cancel_after(cancel: &CancellationToken, millis: u64) {
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
            trigger.cancel();
        });
    }

    pub(crate) fn sketch_completion(call_id: &str, seed: u64) -> Completion {
        let args = serde_json::to_string(&sample_sketch(seed)).unwrap();
        Completion {
            content: None,
            tool_calls: vec![ToolCall::new(call_id, GENERATE_SKETCH, args)],
            finish_reason: Some("tool_calls".into()),
            usage: None,
        }
    }

    pub(crate) fn text_completion(text: &str) -> Completion {
        Completion {
            content: Some(text.into()),
            finish_reason: Some("stop".into()),
            ..Completion::default()
        }
    }

    fn user(text: &str) -> Vec<UiMessage> {
        serde_json::from_value(json!([{ "role": "user", "text": text }])).unwrap()
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn run_with(
        llm: Arc<dyn LlmClient>,
        messages: &[UiMessage],
    ) -> (Result<TurnSummary, AgentError>, Vec<AgentEvent>) {
        let agent = AgentFactory::with_clients(llm, None)
            .create_agent()
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let result = agent.run(messages, &tx, &CancellationToken::new()).await;
        drop(tx);
        (result, drain(rx))
    }

    #[tokio::test]
    async fn first_step_uses_base_instructions_exactly() {
        let llm = Arc::new(ScriptedLlm::new(vec![text_completion("Hi! What shall we draw?")]));
        let (result, events) = run_with(llm.clone(), &user("hello")).await;

        let summary = result.unwrap();
        assert_eq!(summary.stop_reason, StopReason::Completed);
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.sketch, None);
        assert_eq!(llm.instructions.lock().unwrap().as_slice(), [SEED_INSTRUCTIONS]);
        assert!(events.contains(&AgentEvent::TextDelta {
            id: "text-0".into(),
            delta: "Hi! What shall we draw?".into()
        }));
        assert_eq!(
            events.last(),
            Some(&AgentEvent::Finish {
                stop_reason: StopReason::Completed
            })
        );
    }

    #[tokio::test]
    async fn generated_sketch_is_injected_into_next_step() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            sketch_completion("call_1", 4242),
            text_completion("Done."),
        ]));
        let (result, events) = run_with(llm.clone(), &user("draw a circle")).await;

        let summary = result.unwrap();
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.sketch.unwrap().seed, 4242);

        let instructions = llm.instructions.lock().unwrap();
        assert_eq!(instructions[0], SEED_INSTRUCTIONS);
        assert!(instructions[1].starts_with(SEED_INSTRUCTIONS));
        assert!(instructions[1].contains("### Seed\n4242"));

        let output_pos = events
            .iter()
            .position(|e| matches!(e, AgentEvent::ToolOutputAvailable { .. }))
            .unwrap();
        let text_pos = events
            .iter()
            .position(|e| matches!(e, AgentEvent::TextDelta { .. }))
            .unwrap();
        assert!(output_pos < text_pos);
    }

    #[tokio::test]
    async fn prior_turn_sketch_is_injected_on_follow_up() {
        let sketch = sample_sketch(42);
        let value = serde_json::to_value(&sketch).unwrap();
        let messages: Vec<UiMessage> = serde_json::from_value(json!([
            { "role": "user", "text": "draw a circle" },
            { "role": "assistant", "parts": [
                { "type": "step-start" },
                {
                    "type": "tool-generate_sketch",
                    "toolCallId": "call_0",
                    "state": "output-available",
                    "input": value,
                    "output": value
                },
                { "type": "text", "text": "Here you go." }
            ]},
            { "role": "user", "text": "make it red" }
        ]))
        .unwrap();

        let llm = Arc::new(ScriptedLlm::new(vec![text_completion("Sure.")]));
        let (result, _) = run_with(llm.clone(), &messages).await;

        let summary = result.unwrap();
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.sketch, None);
        let instructions = llm.instructions.lock().unwrap();
        assert!(instructions[0].contains("42"));
        assert!(instructions[0].contains(&sketch.code));
    }

    #[tokio::test]
    async fn loop_stops_at_step_ceiling() {
        let llm = Arc::new(ScriptedLlm::repeating(sketch_completion("call", 7)));
        let (result, events) = run_with(llm.clone(), &user("keep going")).await;

        let summary = result.unwrap();
        assert_eq!(summary.stop_reason, StopReason::StepLimit);
        assert_eq!(summary.steps, MAX_STEPS);
        assert_eq!(llm.calls(), MAX_STEPS);
        let step_starts = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::StartStep))
            .count();
        assert_eq!(step_starts, MAX_STEPS);
    }

    #[tokio::test]
    async fn invalid_sketch_is_reported_to_model_not_committed() {
        let mut bad = sketch_completion("call_bad", 5);
        bad.tool_calls[0].function.arguments = "{\"code\": \"x\"}".into();
        let llm = Arc::new(ScriptedLlm::new(vec![bad, text_completion("Sorry.")]));
        let (result, events) = run_with(llm.clone(), &user("draw")).await;

        let summary = result.unwrap();
        assert_eq!(summary.sketch, None);
        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolOutputError { tool_call_id, .. } if tool_call_id == "call_bad"
        )));
        assert_eq!(llm.instructions.lock().unwrap()[1], SEED_INSTRUCTIONS);
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_json_become_tool_errors() {
        let completion = Completion {
            tool_calls: vec![
                ToolCall::new("a", "paint", "{}"),
                ToolCall::new("b", GENERATE_SKETCH, "{not json"),
            ],
            ..Completion::default()
        };
        let llm = Arc::new(ScriptedLlm::new(vec![completion, text_completion("ok")]));
        let (result, events) = run_with(llm, &user("draw")).await;

        assert_eq!(result.unwrap().stop_reason, StopReason::Completed);
        let errors = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::ToolOutputError { .. }))
            .count();
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn provider_failure_is_returned() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let (result, _) = run_with(llm, &user("draw")).await;
        assert!(matches!(result, Err(AgentError::Provider(_))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_call() {
        let agent = AgentFactory::with_clients(Arc::new(HangingLlm), None)
            .create_agent()
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        cancel_after(&cancel, 20);

        let summary = agent.run(&user("draw"), &tx, &cancel).await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.steps, 0);
        drop(tx);
        assert!(!drain(rx)
            .iter()
            .any(|e| matches!(e, AgentEvent::FinishStep)));
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let llm = Arc::new(ScriptedLlm::new(vec![text_completion("never")]));
        let agent = AgentFactory::with_clients(llm.clone(), None)
            .create_agent()
            .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = agent.run(&user("draw"), &tx, &cancel).await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn text_and_reasoning_parts_are_framed() {
        let (result, events) = run_with(Arc::new(ThinkingLlm), &user("hello")).await;
        assert_eq!(result.unwrap().stop_reason, StopReason::Completed);

        let names: Vec<&str> = events.iter().map(AgentEvent::event_name).collect();
        assert_eq!(
            names,
            [
                "start",
                "start-step",
                "reasoning-start",
                "reasoning-delta",
                "text-start",
                "text-delta",
                "text-delta",
                "reasoning-end",
                "text-end",
                "finish-step",
                "finish",
            ]
        );
        assert!(events.contains(&AgentEvent::TextEnd { id: "text-0".into() }));
    }

    #[tokio::test]
    async fn cancellation_during_tools_commits_no_partial_step() {
        let sketch_args = serde_json::to_string(&sample_sketch(11)).unwrap();
        let completion = Completion {
            tool_calls: vec![
                ToolCall::new("call_sketch", GENERATE_SKETCH, sketch_args),
                ToolCall::new("call_search", WEB_SEARCH, r#"{"query": "p5.js news"}"#),
            ],
            ..Completion::default()
        };
        let llm = Arc::new(ScriptedLlm::new(vec![completion]));
        let agent = AgentFactory::with_clients(llm.clone(), Some(Arc::new(HangingSearch)))
            .create_agent()
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel_after(&cancel, 20);

        let summary = agent.run(&user("draw"), &tx, &cancel).await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.sketch, None);
        assert_eq!(llm.calls(), 1);

        drop(tx);
        let events = drain(rx);
        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolOutputAvailable { tool_call_id, .. } if tool_call_id == "call_sketch"
        )));
        assert!(!events.iter().any(|e| matches!(e, AgentEvent::FinishStep)));
        assert_eq!(
            events.last(),
            Some(&AgentEvent::Finish {
                stop_reason: StopReason::Cancelled
            })
        );
    }
}
