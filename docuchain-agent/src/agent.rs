use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use docuchain_core::{
    ensure_object, CallbackManager, DocuchainError, RunConfig, RunContext, RunType, Value,
};

use crate::{AgentError, ExecutionEvent};

pub type EventStream<'a> = BoxStream<'a, Result<ExecutionEvent, AgentError>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<(String, String)>,
}

impl AgentInput {
    pub fn new(question: impl Into<String>, chat_history: Vec<(String, String)>) -> Self {
        Self {
            question: question.into(),
            chat_history,
        }
    }
}

/// An execution backend the coordinator can drive.
///
/// Backends report their root run through the callbacks in `config`; the
/// first root run recorded is the correlation id attached to the final
/// snapshot.
pub trait Agent: Send + Sync {
    /// Label used as the source of streamed answers.
    fn name(&self) -> &str;

    /// Returns the final answer contained in the text generated so far.
    fn parse_final_answer(&self, text: &str) -> Option<String>;

    fn stream_events(&self, input: AgentInput, config: RunConfig) -> EventStream<'_>;
}

/// Wraps a backend's event stream in a root agent run reported through the
/// callbacks of `config`. `run` receives the root context so it can record
/// child runs.
pub(crate) fn traced_events<'a, F>(
    default_name: &str,
    input: AgentInput,
    config: RunConfig,
    run: F,
) -> EventStream<'a>
where
    F: FnOnce(AgentInput, RunContext, CallbackManager) -> EventStream<'a> + Send + 'a,
{
    let name = config
        .name_override
        .clone()
        .unwrap_or_else(|| default_name.to_string());
    let stream = try_stream! {
        let callbacks = config.callback_manager();
        let ctx = RunContext::root(
            RunType::Agent,
            name,
            config.tags.clone(),
            config.metadata.clone(),
        );
        let inputs = serde_json::to_value(&input).map_err(DocuchainError::from)?;
        callbacks.on_start(&ctx, &ensure_object(inputs)).await;

        let mut events = run(input, ctx.clone(), callbacks.clone());
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    yield event;
                }
                Err(err) => {
                    let error = ensure_object(Value::String(err.to_string()));
                    let elapsed = ctx.start_instant.elapsed().as_millis();
                    callbacks.on_error(&ctx, &error, elapsed).await;
                    Err::<(), _>(err)?;
                }
            }
        }

        let elapsed = ctx.start_instant.elapsed().as_millis();
        callbacks
            .on_end(&ctx, &Value::Object(Default::default()), elapsed)
            .await;
    };
    stream.boxed()
}
