use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use docuchain_core::{RunConfig, TraceCollector, TryFromValue, Value};

use crate::{Agent, AgentError, AgentInput, AgentState, ExecutionEvent, TracedResponse};

pub type AgentStateStream<'a> = BoxStream<'a, Result<TracedResponse<AgentState>, AgentError>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Interim steps are forwarded as they arrive.
    AwaitingFinal,
    /// A final answer was detected; only answer snapshots go out.
    StreamingFinal,
    Done,
}

/// Streams incremental snapshots of an agent run.
///
/// Step outputs are yielded until the final answer is first detected in the
/// generated tokens. From then on only answer-only snapshots are yielded.
/// The stream ends with exactly one snapshot whose cited answer is final,
/// carrying the id of the first traced root run, if any.
pub fn run_stream<'a, A>(
    agent: &'a A,
    question: &str,
    chat_history: Vec<(String, String)>,
) -> AgentStateStream<'a>
where
    A: Agent + ?Sized,
{
    run_stream_with_config(
        agent,
        AgentInput::new(question, chat_history),
        RunConfig::default(),
    )
}

/// Like [`run_stream`], forwarding caller-supplied callbacks, tags and
/// metadata to the backend.
pub fn run_stream_with_config<'a, A>(
    agent: &'a A,
    input: AgentInput,
    config: RunConfig,
) -> AgentStateStream<'a>
where
    A: Agent + ?Sized,
{
    let stream = try_stream! {
        if input.question.trim().is_empty() {
            Err::<(), _>(AgentError::MissingInput("question"))?;
        }

        let collector = TraceCollector::new();
        let mut callbacks = config.callback_manager();
        callbacks.add_handler(Arc::new(collector.clone()));
        let config = RunConfig {
            callbacks: Some(callbacks),
            ..config
        };

        debug!(agent = agent.name(), "agent run started");
        let mut events = agent.stream_events(input, config);
        let mut phase = Phase::AwaitingFinal;
        let mut tokens = String::new();
        let mut last: Option<AgentState> = None;
        let mut pending_answer: Option<String> = None;
        let mut answer_streamed = false;

        while let Some(event) = events.next().await {
            match event? {
                ExecutionEvent::StepOutput(payload) => {
                    if phase != Phase::AwaitingFinal {
                        continue;
                    }
                    tokens.clear();
                    let mut state = decode_step(payload)?;
                    // only the terminal snapshot may be final
                    if let Some(cited) = state.cited_answer.as_mut() {
                        cited.is_final = false;
                    }
                    last = Some(state.clone());
                    yield TracedResponse::untraced(state);
                }
                ExecutionEvent::Token(token) => {
                    tokens.push_str(&token);
                    let Some(answer) = agent.parse_final_answer(&tokens) else {
                        continue;
                    };
                    match phase {
                        Phase::AwaitingFinal => {
                            debug!(agent = agent.name(), "final answer detected");
                            phase = Phase::StreamingFinal;
                            pending_answer = Some(answer);
                        }
                        Phase::StreamingFinal => {
                            let state = AgentState::answer_only(agent.name(), answer);
                            answer_streamed = true;
                            last = Some(state.clone());
                            yield TracedResponse::untraced(state);
                        }
                        Phase::Done => {}
                    }
                }
            }
        }
        phase = Phase::Done;

        if !answer_streamed {
            if let Some(answer) = pending_answer {
                last = Some(AgentState::answer_only(agent.name(), answer));
            }
        }

        let mut terminal = last.ok_or(AgentError::NoResponseProduced)?;
        match terminal.cited_answer.as_mut() {
            Some(cited) => cited.is_final = true,
            None => warn!(agent = agent.name(), "agent run ended without a cited answer"),
        }
        let run_id = collector.first_run_id();
        debug!(agent = agent.name(), ?phase, ?run_id, "agent run finished");
        yield TracedResponse {
            value: terminal,
            run_id,
        };
    };
    stream.boxed()
}

fn decode_step(payload: serde_json::Map<String, Value>) -> Result<AgentState, AgentError> {
    if payload.len() != 1 {
        return Err(AgentError::malformed(format!(
            "step output must name exactly one node, got {}",
            payload.len()
        )));
    }
    let (node, value) = payload
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::malformed("empty step output"))?;
    AgentState::try_from_value(value)
        .map_err(|err| AgentError::malformed(format!("node '{node}': {err}")))
}

/// Drains [`run_stream`] and returns the terminal snapshot.
pub async fn run<A>(
    agent: &A,
    question: &str,
    chat_history: Vec<(String, String)>,
) -> Result<TracedResponse<AgentState>, AgentError>
where
    A: Agent + ?Sized,
{
    let mut stream = run_stream(agent, question, chat_history);
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item?);
    }
    last.ok_or(AgentError::NoResponseProduced)
}

/// Runs each input in turn, returning the terminal snapshots in input order.
pub async fn run_batch<A>(
    agent: &A,
    inputs: Vec<AgentInput>,
) -> Result<Vec<TracedResponse<AgentState>>, AgentError>
where
    A: Agent + ?Sized,
{
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        results.push(run(agent, &input.question, input.chat_history).await?);
    }
    Ok(results)
}
