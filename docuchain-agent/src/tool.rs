use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use docuchain_core::{DocuchainError, LlmRequest, LlmResponse, Message, Runnable};

use crate::{AgentError, AgentState, CitedAnswer, Invocation, StepState};

/// Status shown for a snapshot that is neither a tool call nor an answer.
pub const THINKING: &str = "Thinking...";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn run(&self, input: &str) -> Result<CitedAnswer, DocuchainError>;

    fn to_human_readable(&self, invocation: &Invocation) -> String {
        format!(
            "Invoking {} with input: {}",
            invocation.tool_name, invocation.tool_input
        )
    }
}

/// Registry of tools by name. Runs the pending invocation of a state.
#[derive(Clone, Default)]
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), DocuchainError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(DocuchainError::InvalidConfig(format!(
                "duplicate tool name '{name}'"
            )));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tools in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Runs the state's pending invocation once. Failures are not retried.
    pub async fn execute(&self, state: &AgentState) -> Result<StepState, AgentError> {
        let invocation = state
            .tool_invocation
            .as_ref()
            .ok_or(AgentError::MissingInput("tool_invocation"))?;
        let tool_name = invocation.tool_name.clone();
        let tool = self.tools.get(&tool_name).ok_or_else(|| {
            warn!(tool = %tool_name, "unknown tool requested");
            AgentError::ToolExecution {
                tool_name: tool_name.clone(),
                source: DocuchainError::ToolCallFailed {
                    tool_name: tool_name.clone(),
                    reason: "tool not found".to_string(),
                },
            }
        })?;

        debug!(tool = %tool_name, "executing tool");
        let answer = tool
            .run(&invocation.tool_input)
            .await
            .map_err(|source| AgentError::ToolExecution {
                tool_name: tool_name.clone(),
                source,
            })?;

        Ok(StepState {
            invocation: invocation.clone(),
            output: answer.answer,
        })
    }

    /// One-line status for a snapshot, suitable for UIs.
    pub fn to_human_readable(&self, state: &AgentState) -> String {
        if let Some(answer) = &state.cited_answer {
            return answer.answer.clone();
        }
        match &state.tool_invocation {
            Some(invocation) => match self.tools.get(&invocation.tool_name) {
                Some(tool) => tool.to_human_readable(invocation),
                None => format!("Invoking {}", invocation.tool_name),
            },
            None => THINKING.to_string(),
        }
    }
}

/// Fallback tool for questions no other tool can answer.
#[derive(Clone, Copy, Debug, Default)]
pub struct HumanInterventionTool;

impl HumanInterventionTool {
    pub const NAME: &'static str = "human_intervention";
    const DESCRIPTION: &'static str = "Use when no other tool is likely to answer this question, but you think the question can likely be answered via SQL query over a table (assuming the table contains the data the user is looking for).";
    const ANSWER: &'static str = "Sorry, I don't have enough information to answer this question. Please try rephrasing the question, or please create or update reports against the relevant docset that maybe queried to answer questions like this one";
}

#[async_trait]
impl Tool for HumanInterventionTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    async fn run(&self, _input: &str) -> Result<CitedAnswer, DocuchainError> {
        Ok(CitedAnswer::new(Self::NAME, Self::ANSWER))
    }

    fn to_human_readable(&self, _invocation: &Invocation) -> String {
        "Asking for human intervention".to_string()
    }
}

const SMALL_TALK_PROMPT: &str = "You are a helpful assistant. Answer the user directly from general knowledge, in a friendly and concise way. If the user is just greeting you or making small talk, reply in kind.";

/// Answers greetings and general-knowledge questions straight from an LLM,
/// without consulting any document.
pub struct SmallTalkTool<L> {
    llm: L,
    model: String,
}

impl<L> SmallTalkTool<L> {
    pub const NAME: &'static str = "small_talk";
    const DESCRIPTION: &'static str = "Use when user greets you, wants to smalltalk, or asks a question you can directly answer based on general knowledge without consulting any other tool.";

    pub fn new(llm: L) -> Self {
        Self {
            llm,
            model: String::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl<L> Tool for SmallTalkTool<L>
where
    L: Runnable<LlmRequest, LlmResponse> + Send + Sync,
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    async fn run(&self, input: &str) -> Result<CitedAnswer, DocuchainError> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![Message::system(SMALL_TALK_PROMPT), Message::user(input)],
            stop: Vec::new(),
        };
        let response = self.llm.invoke(request).await?;
        Ok(CitedAnswer::new(Self::NAME, response.content.trim()))
    }
}
