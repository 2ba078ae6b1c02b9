//! docuchain: streaming document agents and fused-summary retrieval.
//!
//! Re-exports the workspace crates behind the `agent` and `retrieval`
//! features. With both enabled, [`RetrievalTool`] lets an agent query a
//! fused-summary retriever.

pub use docuchain_core as core;

#[cfg(feature = "agent")]
pub use docuchain_agent as agent;

#[cfg(feature = "retrieval")]
pub use docuchain_retrieval as retrieval;

#[cfg(all(feature = "agent", feature = "retrieval"))]
mod retrieval_tool;

#[cfg(all(feature = "agent", feature = "retrieval"))]
pub use retrieval_tool::{retrieval_tool_function_name, RetrievalTool};

pub mod prelude {
    pub use docuchain_core::{
        CallbackManager, Document, DocuchainError, LlmRequest, LlmResponse, Message, Role,
        RunConfig, Runnable, StreamEvent, TraceCollector, Value,
    };

    #[cfg(feature = "agent")]
    pub use docuchain_agent::{
        run, run_stream, Agent, AgentError, AgentState, CitedAnswer, ParseMode, ReActAgent,
        ReWooAgent, Tool, TracedResponse,
    };

    #[cfg(feature = "retrieval")]
    pub use docuchain_retrieval::{
        FragmentSearch, FusedSummaryRetriever, HashMapResolver, KeyValueResolver,
        RelevanceGrader, RetrievalError, SearchType,
    };

    #[cfg(all(feature = "agent", feature = "retrieval"))]
    pub use crate::RetrievalTool;
}
