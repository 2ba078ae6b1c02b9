use std::sync::Arc;

use async_stream::try_stream;
use futures::StreamExt;
use tracing::{debug, warn};

use docuchain_core::{
    DocuchainError, LlmRequest, LlmResponse, Message, RunConfig, Runnable, StreamEvent,
};

use crate::agent::traced_events;
use crate::history::steps_to_str;
use crate::{
    Agent, AgentError, AgentInput, AgentState, CitedAnswer, EventStream, ExecutionEvent,
    FinalAnswerRule, ParseMode, ParsedOutput, ReActJsonOutputParser, Tool, ToolExecutor,
};

const DEFAULT_NAME: &str = "ReActAgent";
const DEFAULT_MAX_ITERATIONS: usize = 12;
const AGENT_NODE: &str = "agent";
const TOOLS_NODE: &str = "tools";
const OBSERVATION_PREFIX: &str = "Observation:";

const SYSTEM_PROMPT: &str = "Answer the question as best you can. You have access to the following tools:\n\n{tools}\n\nTo use a tool, reply with a thought followed by a single JSON blob in a ```json fenced block, with an \"action\" key naming one of [{tool_names}] and an \"action_input\" key holding the tool input. Stop after the blob and wait for the observation.\n\nWhen you know the answer, reply with:\nFinal Answer: <the answer>";

/// ReAct loop over a streaming LLM: think, call one tool, observe, repeat
/// until the model gives a final answer.
pub struct ReActAgent<L> {
    name: String,
    llm: L,
    model: String,
    executor: ToolExecutor,
    parser: ReActJsonOutputParser,
    final_answer_rule: FinalAnswerRule,
    max_iterations: usize,
}

pub struct ReActAgentBuilder<L> {
    name: String,
    llm: Option<L>,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    parse_mode: ParseMode,
    max_iterations: usize,
}

impl<L> ReActAgent<L> {
    pub fn builder() -> ReActAgentBuilder<L> {
        ReActAgentBuilder {
            name: DEFAULT_NAME.to_string(),
            llm: None,
            model: String::new(),
            tools: Vec::new(),
            parse_mode: ParseMode::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn build_messages(&self, state: &AgentState) -> Vec<Message> {
        let tools = self
            .executor
            .tools()
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names = self
            .executor
            .tools()
            .map(|tool| tool.name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let system = SYSTEM_PROMPT
            .replace("{tools}", &tools)
            .replace("{tool_names}", &tool_names);

        let mut messages = vec![Message::system(system)];
        for (speaker, text) in &state.chat_history {
            if is_human(speaker) {
                messages.push(Message::user(text.clone()));
            } else {
                messages.push(Message::assistant(text.clone()));
            }
        }
        messages.push(Message::user(state.question.clone()));
        for step in state.intermediate_steps() {
            messages.push(Message::assistant(step.invocation.log.clone()));
            messages.push(Message::user(format!("{OBSERVATION_PREFIX} {}", step.output)));
        }
        messages
    }
}

fn is_human(speaker: &str) -> bool {
    matches!(
        speaker.trim().to_lowercase().as_str(),
        "human" | "user"
    )
}

impl<L> ReActAgent<L>
where
    L: Runnable<LlmRequest, LlmResponse> + Send + Sync,
{
    fn react_loop(&self, input: AgentInput) -> EventStream<'_> {
        let stream = try_stream! {
            let mut state = AgentState::new(input.question, input.chat_history);
            let mut answered = false;

            for iteration in 0..self.max_iterations {
                let request = LlmRequest {
                    model: self.model.clone(),
                    messages: self.build_messages(&state),
                    stop: vec![OBSERVATION_PREFIX.to_string()],
                };
                let mut chunks = self.llm.stream(request);
                let mut text = String::new();
                while let Some(chunk) = chunks.next().await {
                    match chunk? {
                        StreamEvent::ContentChunk(delta) => {
                            text.push_str(&delta);
                            yield ExecutionEvent::Token(delta);
                        }
                        StreamEvent::FinalAnswer(full) => {
                            if text.is_empty() {
                                text = full.clone();
                                yield ExecutionEvent::Token(full);
                            }
                        }
                        StreamEvent::Metadata { .. } => {}
                    }
                }

                match self.parser.parse(&text)? {
                    ParsedOutput::Invocation(invocation) => {
                        debug!(iteration, tool = %invocation.tool_name, "tool requested");
                        state.tool_invocation = Some(invocation);
                        let requested = ExecutionEvent::step(AGENT_NODE, &state)?;
                        yield requested;

                        let step = self.executor.execute(&state).await?;
                        state.tool_invocation = None;
                        state.append_step(step);
                        let observed = ExecutionEvent::step(TOOLS_NODE, &state)?;
                        yield observed;
                    }
                    ParsedOutput::FinalAnswer(answer) => {
                        debug!(iteration, "final answer parsed");
                        state.cited_answer = Some(CitedAnswer::new(self.name.clone(), answer));
                        let answered_event = ExecutionEvent::step(AGENT_NODE, &state)?;
                        yield answered_event;
                        answered = true;
                        break;
                    }
                }
            }

            if !answered {
                warn!(
                    max_iterations = self.max_iterations,
                    steps = %steps_to_str(state.intermediate_steps()),
                    "react agent gave up without a final answer"
                );
                Err::<(), _>(AgentError::MaxIterations {
                    max: self.max_iterations,
                })?;
            }
        };
        stream.boxed()
    }
}

impl<L> Agent for ReActAgent<L>
where
    L: Runnable<LlmRequest, LlmResponse> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn parse_final_answer(&self, text: &str) -> Option<String> {
        self.final_answer_rule.extract(text)
    }

    fn stream_events(&self, input: AgentInput, config: RunConfig) -> EventStream<'_> {
        traced_events(&self.name, input, config, move |input, _, _| {
            self.react_loop(input)
        })
    }
}

impl<L> ReActAgentBuilder<L> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn llm(mut self, llm: L) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations_from_env(mut self, var_name: &str) -> Self {
        if let Ok(value) = std::env::var(var_name) {
            match value.trim().parse() {
                Ok(parsed) => self.max_iterations = parsed,
                Err(_) => warn!(var = var_name, %value, "ignoring non-numeric max iterations"),
            }
        }
        self
    }

    pub fn build(self) -> Result<ReActAgent<L>, DocuchainError> {
        let llm = self
            .llm
            .ok_or_else(|| DocuchainError::InvalidConfig("llm is required".to_string()))?;
        if self.max_iterations == 0 {
            return Err(DocuchainError::InvalidConfig(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        let mut executor = ToolExecutor::new();
        for tool in self.tools {
            executor.register(tool)?;
        }
        Ok(ReActAgent {
            name: self.name,
            llm,
            model: self.model,
            executor,
            parser: ReActJsonOutputParser::new(self.parse_mode),
            final_answer_rule: FinalAnswerRule::ReActMarker,
            max_iterations: self.max_iterations,
        })
    }
}
