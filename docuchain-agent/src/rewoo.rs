use std::sync::{Arc, OnceLock};

use async_stream::try_stream;
use futures::StreamExt;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use docuchain_core::{
    ensure_object, CallbackManager, DocuchainError, LlmRequest, LlmResponse, Message, RunConfig,
    RunContext, RunType, Runnable, StreamEvent, Value,
};

use crate::agent::traced_events;
use crate::{
    Agent, AgentError, AgentInput, AgentState, Citation, CitedAnswer, EventStream,
    ExecutionEvent, FinalAnswerRule, Invocation, OutputParseError, Tool, ToolExecutor,
};

const DEFAULT_NAME: &str = "ReWOOAgent";
const DEFAULT_MAX_STEPS: usize = 8;
const PLANNER_NODE: &str = "planner";
const WORKER_NODE: &str = "worker";
const SOLVER_NODE: &str = "solver";

const PLAN_STEP_PATTERN: &str = r"^\s*(#E\d+)\s*=\s*([\w\-]+)\s*\[(.*)\]\s*$";

fn plan_step() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLAN_STEP_PATTERN).expect("plan step pattern is valid"))
}

const PLANNER_PROMPT: &str = "For the following task, make plans that can solve the problem step by step. For each plan, indicate which external tool together with tool input to retrieve evidence. You can store the evidence into a variable #E that can be called by later tools. (Plan, #E1, Plan, #E2, Plan, ...)\n\nTools can be one of the following:\n{tools}\n\nFormat each step as:\nPlan: <reasoning>\n#E1 = <tool name>[<tool input>]\n\nIf the task can be answered directly from general knowledge, reply with a single Plan line and no evidence.";

const SOLVER_PROMPT: &str = "Solve the following task. To help you, plans were made and evidence was gathered for each of them. Use the evidence with caution since long evidence might contain irrelevant information.\n\n{plan}\n\nNow solve the task. Reply with a single JSON object with the keys \"source\" (\"{name}\"), \"answer\" (your answer) and \"is_final\" (true), and nothing else.\n\nTask: {question}";

/// One `#E = tool[input]` line of a plan.
#[derive(Clone, Debug, PartialEq, Eq)]
struct PlannedStep {
    label: String,
    reasoning: String,
    tool_name: String,
    tool_input: String,
}

fn parse_plan(text: &str) -> Vec<PlannedStep> {
    let mut steps = Vec::new();
    let mut reasoning = Vec::new();
    for line in text.lines() {
        match plan_step().captures(line) {
            Some(captures) => {
                steps.push(PlannedStep {
                    label: captures[1].to_string(),
                    reasoning: reasoning.join("\n"),
                    tool_name: captures[2].to_string(),
                    tool_input: captures[3].trim().to_string(),
                });
                reasoning.clear();
            }
            None => {
                let line = line.trim();
                if !line.is_empty() {
                    reasoning.push(line.to_string());
                }
            }
        }
    }
    steps
}

/// Replaces `#E<n>` references with earlier evidence. Longer labels go
/// first so `#E1` never clobbers `#E12`.
fn substitute(input: &str, evidence: &[(String, String)]) -> String {
    let mut ordered: Vec<&(String, String)> = evidence.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    ordered
        .into_iter()
        .fold(input.to_string(), |text, (label, output)| {
            text.replace(label.as_str(), output)
        })
}

fn text_value(text: &str) -> Value {
    ensure_object(Value::String(text.to_string()))
}

fn elapsed_ms(ctx: &RunContext) -> u128 {
    ctx.start_instant.elapsed().as_millis()
}

#[derive(Deserialize)]
struct SolverOutput {
    #[serde(default)]
    source: String,
    answer: String,
    #[serde(default)]
    citations: Vec<Citation>,
    #[serde(default)]
    is_final: bool,
}

fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Plan, work, solve: the planner writes every tool call up front, the
/// worker runs them in order feeding earlier evidence into later inputs,
/// and the solver streams a cited-answer JSON object.
pub struct ReWooAgent<L> {
    name: String,
    llm: L,
    model: String,
    executor: ToolExecutor,
    max_steps: usize,
}

pub struct ReWooAgentBuilder<L> {
    name: String,
    llm: Option<L>,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    max_steps: usize,
}

impl<L> ReWooAgent<L> {
    pub fn builder() -> ReWooAgentBuilder<L> {
        ReWooAgentBuilder {
            name: DEFAULT_NAME.to_string(),
            llm: None,
            model: String::new(),
            tools: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    fn history_messages(&self, state: &AgentState) -> Vec<Message> {
        state
            .chat_history
            .iter()
            .map(|(speaker, text)| match speaker.trim().to_lowercase().as_str() {
                "human" | "user" => Message::user(text.clone()),
                _ => Message::assistant(text.clone()),
            })
            .collect()
    }

    fn planner_request(&self, state: &AgentState) -> LlmRequest {
        let tools = self
            .executor
            .tools()
            .map(|tool| format!("{}[input]: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let mut messages = vec![Message::system(PLANNER_PROMPT.replace("{tools}", &tools))];
        messages.extend(self.history_messages(state));
        messages.push(Message::user(format!("Task: {}", state.question)));
        LlmRequest {
            model: self.model.clone(),
            messages,
            stop: Vec::new(),
        }
    }

    fn solver_request(&self, state: &AgentState, plan: &str) -> LlmRequest {
        let mut worked = String::new();
        for step in state.intermediate_steps() {
            worked.push_str(&step.invocation.log);
            worked.push_str("\nEvidence: ");
            worked.push_str(&step.output);
            worked.push('\n');
        }
        if worked.is_empty() {
            worked = plan.trim().to_string();
        }
        let prompt = SOLVER_PROMPT
            .replace("{plan}", worked.trim_end())
            .replace("{name}", &self.name)
            .replace("{question}", &state.question);
        let mut messages = self.history_messages(state);
        messages.push(Message::user(prompt));
        LlmRequest {
            model: self.model.clone(),
            messages,
            stop: Vec::new(),
        }
    }

    fn cited_answer(&self, text: &str) -> Result<CitedAnswer, OutputParseError> {
        let unparsable = || OutputParseError::UnparsableOutput {
            text: text.to_string(),
        };
        let blob = json_object(text).ok_or_else(unparsable)?;
        let output: SolverOutput = serde_json::from_str(blob).map_err(|_| unparsable())?;
        let answer = output.answer.trim();
        if answer.is_empty() {
            return Err(unparsable());
        }
        let source = if output.source.trim().is_empty() {
            self.name.clone()
        } else {
            output.source
        };
        Ok(CitedAnswer {
            source,
            answer: answer.to_string(),
            citations: output.citations,
            is_final: output.is_final,
            ..CitedAnswer::default()
        })
    }
}

impl<L> ReWooAgent<L>
where
    L: Runnable<LlmRequest, LlmResponse> + Send + Sync,
{
    fn plan_work_solve(
        &self,
        input: AgentInput,
        root: RunContext,
        callbacks: CallbackManager,
    ) -> EventStream<'_> {
        let stream = try_stream! {
            let mut state = AgentState::new(input.question, input.chat_history);

            let planner = root.child(RunType::Llm, PLANNER_NODE.to_string());
            callbacks.on_start(&planner, &text_value(&state.question)).await;
            let plan = self.llm.invoke(self.planner_request(&state)).await?.content;
            callbacks
                .on_end(&planner, &text_value(&plan), elapsed_ms(&planner))
                .await;

            let steps = parse_plan(&plan);
            debug!(steps = steps.len(), "plan ready");
            if steps.len() > self.max_steps {
                Err::<(), _>(AgentError::MaxIterations { max: self.max_steps })?;
            }
            let planned = ExecutionEvent::step(PLANNER_NODE, &state)?;
            yield planned;

            let mut evidence: Vec<(String, String)> = Vec::with_capacity(steps.len());
            for planned_step in steps {
                let tool_input = substitute(&planned_step.tool_input, &evidence);
                let log = format!(
                    "{}\n{} = {}[{}]",
                    planned_step.reasoning, planned_step.label, planned_step.tool_name, tool_input
                );
                state.tool_invocation = Some(Invocation {
                    tool_name: planned_step.tool_name.clone(),
                    tool_input: tool_input.clone(),
                    log: log.trim().to_string(),
                });
                let requested = ExecutionEvent::step(WORKER_NODE, &state)?;
                yield requested;

                let tool_run = root.child(RunType::Tool, planned_step.tool_name.clone());
                callbacks.on_start(&tool_run, &text_value(&tool_input)).await;
                let result = self.executor.execute(&state).await;
                match &result {
                    Ok(step) => {
                        let output = text_value(&step.output);
                        callbacks.on_end(&tool_run, &output, elapsed_ms(&tool_run)).await;
                    }
                    Err(err) => {
                        let error = text_value(&err.to_string());
                        callbacks.on_error(&tool_run, &error, elapsed_ms(&tool_run)).await;
                    }
                }
                let step = result?;

                evidence.push((planned_step.label, step.output.clone()));
                state.tool_invocation = None;
                state.append_step(step);
                let observed = ExecutionEvent::step(WORKER_NODE, &state)?;
                yield observed;
            }

            let solver = root.child(RunType::Llm, SOLVER_NODE.to_string());
            callbacks.on_start(&solver, &text_value(&state.question)).await;
            let mut chunks = self.llm.stream(self.solver_request(&state, &plan));
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
            callbacks
                .on_end(&solver, &text_value(&text), elapsed_ms(&solver))
                .await;

            state.cited_answer = Some(self.cited_answer(&text)?);
            let solved = ExecutionEvent::step(SOLVER_NODE, &state)?;
            yield solved;
        };
        stream.boxed()
    }
}

impl<L> Agent for ReWooAgent<L>
where
    L: Runnable<LlmRequest, LlmResponse> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn parse_final_answer(&self, text: &str) -> Option<String> {
        FinalAnswerRule::JsonAnswerField.extract(text)
    }

    fn stream_events(&self, input: AgentInput, config: RunConfig) -> EventStream<'_> {
        traced_events(&self.name, input, config, move |input, root, callbacks| {
            self.plan_work_solve(input, root, callbacks)
        })
    }
}

impl<L> ReWooAgentBuilder<L> {
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

    /// Largest number of tool calls a plan may contain.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Result<ReWooAgent<L>, DocuchainError> {
        let llm = self
            .llm
            .ok_or_else(|| DocuchainError::InvalidConfig("llm is required".to_string()))?;
        if self.max_steps == 0 {
            return Err(DocuchainError::InvalidConfig(
                "max_steps must be greater than 0".to_string(),
            ));
        }
        let mut executor = ToolExecutor::new();
        for tool in self.tools {
            executor.register(tool)?;
        }
        Ok(ReWooAgent {
            name: self.name,
            llm,
            model: self.model,
            executor,
            max_steps: self.max_steps,
        })
    }
}
