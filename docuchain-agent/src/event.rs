use serde::Serialize;

use docuchain_core::Value;

use crate::AgentError;

/// Events emitted by an agent backend while it executes.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionEvent {
    /// A node finished; maps the node name to its state payload.
    StepOutput(serde_json::Map<String, Value>),
    /// An increment of model-generated text.
    Token(String),
}

impl ExecutionEvent {
    /// Builds a well-formed step output for `node`.
    pub fn step<S: Serialize>(node: impl Into<String>, state: &S) -> Result<Self, AgentError> {
        let payload = serde_json::to_value(state).map_err(docuchain_core::DocuchainError::from)?;
        let mut map = serde_json::Map::new();
        map.insert(node.into(), payload);
        Ok(ExecutionEvent::StepOutput(map))
    }

    pub fn token(text: impl Into<String>) -> Self {
        ExecutionEvent::Token(text.into())
    }
}
