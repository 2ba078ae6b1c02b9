//! Shared primitives for docuchain: errors, documents, LLM request types,
//! the `Runnable` abstraction and run tracing callbacks.

pub mod callbacks;
mod document;
mod embedding;
mod error;
mod llm;
mod output_parsers;
mod runnable;
mod value;

pub use callbacks::{
    ensure_object, CallbackHandler, CallbackManager, RunConfig, RunContext, RunType, TraceCollector,
};
pub use document::Document;
pub use embedding::Embedding;
pub use error::{DocuchainError, EmbeddingError};
pub use llm::{LlmRequest, LlmResponse, Message, Role};
pub use output_parsers::{StrOutputParser, TruthyOutputParser};
pub use runnable::{Runnable, StreamEvent};
pub use value::{TryFromValue, Value};
