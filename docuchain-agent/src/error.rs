use docuchain_core::DocuchainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputParseError {
    #[error("Parsing LLM output produced a final answer and a parse-able action: {text}")]
    ConflictingOutput { text: String },
    #[error("Could not parse LLM output: {text}")]
    UnparsableOutput { text: String },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Input required: {0}")]
    MissingInput(&'static str),
    #[error("malformed stream event: {reason}")]
    MalformedStreamEvent { reason: String },
    #[error("agent stream ended without producing a response")]
    NoResponseProduced,
    #[error(transparent)]
    Parse(#[from] OutputParseError),
    #[error("tool '{tool_name}' failed: {source}")]
    ToolExecution {
        tool_name: String,
        #[source]
        source: DocuchainError,
    },
    #[error("no final answer after {max} iterations")]
    MaxIterations { max: usize },
    #[error(transparent)]
    Backend(#[from] DocuchainError),
}

impl AgentError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AgentError::MalformedStreamEvent {
            reason: reason.into(),
        }
    }
}
