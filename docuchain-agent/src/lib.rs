//! Streaming agents for docuchain.
//!
//! The [`run_stream`] coordinator turns the event stream of an [`Agent`]
//! backend into incremental [`AgentState`] snapshots, holding back interim
//! steps once the final answer starts streaming and finishing with exactly
//! one snapshot whose cited answer is marked final.

mod agent;
mod answer;
mod coordinator;
mod error;
mod event;
mod history;
mod parser;
mod react;
mod rewoo;
mod state;
mod tool;

pub use agent::{Agent, AgentInput, EventStream};
pub use answer::{json_answer_field, react_final_answer, FinalAnswerRule, FINAL_ANSWER_MARKER};
pub use coordinator::{run, run_batch, run_stream, run_stream_with_config, AgentStateStream};
pub use error::{AgentError, OutputParseError};
pub use event::ExecutionEvent;
pub use history::{chat_history_to_str, steps_to_str};
pub use parser::{ParseMode, ParsedOutput, ReActJsonOutputParser};
pub use react::{ReActAgent, ReActAgentBuilder};
pub use rewoo::{ReWooAgent, ReWooAgentBuilder};
pub use state::{
    AgentState, Citation, CitationType, CitedAnswer, Invocation, StepState, TracedResponse,
};
pub use tool::{HumanInterventionTool, SmallTalkTool, Tool, ToolExecutor, THINKING};
