use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docuchain_core::Value;

/// A single tool call requested by the model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub tool_name: String,
    pub tool_input: String,
    /// Raw model text the invocation was parsed from.
    pub log: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub invocation: Invocation,
    pub output: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationType {
    Document,
    Report,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub label: String,
    #[serde(default)]
    pub citation_type: CitationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_query: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CitedAnswer {
    pub source: String,
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    #[serde(default)]
    pub is_final: bool,
}

impl CitedAnswer {
    pub fn new(source: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            answer: answer.into(),
            ..Self::default()
        }
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }
}

/// Snapshot of an agent run as observed by callers.
///
/// `intermediate_steps` only grows: the single mutator is
/// [`AgentState::append_step`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<(String, String)>,
    #[serde(default)]
    pub tool_invocation: Option<Invocation>,
    #[serde(default)]
    intermediate_steps: Vec<StepState>,
    #[serde(default)]
    pub cited_answer: Option<CitedAnswer>,
}

impl AgentState {
    pub fn new(question: impl Into<String>, chat_history: Vec<(String, String)>) -> Self {
        Self {
            question: question.into(),
            chat_history,
            ..Self::default()
        }
    }

    /// Snapshot carrying nothing but a partial answer, used while the final
    /// answer is still streaming.
    pub fn answer_only(source: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            cited_answer: Some(CitedAnswer::new(source, answer)),
            ..Self::default()
        }
    }

    pub fn intermediate_steps(&self) -> &[StepState] {
        &self.intermediate_steps
    }

    pub fn append_step(&mut self, step: StepState) {
        self.intermediate_steps.push(step);
    }

    pub fn is_final(&self) -> bool {
        self.cited_answer
            .as_ref()
            .map(|answer| answer.is_final)
            .unwrap_or(false)
    }
}

/// A value paired with the id of the traced run that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracedResponse<T> {
    pub value: T,
    pub run_id: Option<Uuid>,
}

impl<T> TracedResponse<T> {
    pub fn untraced(value: T) -> Self {
        Self {
            value,
            run_id: None,
        }
    }
}
