//! Fused-summary retrieval: fragments found by a search backend are
//! regrouped by the document they came from and rendered as one composite
//! document per source, with the full-document summary on top.

mod error;
mod fused;
mod grader;
mod hash_embedder;
mod in_memory;
mod resolver;
mod search;

pub use error::{RetrievalError, RetrievalResult};
pub use fused::{
    FusedDocumentElements, FusedSummaryRetriever, FusedSummaryRetrieverBuilder,
    DEFAULT_RETRIEVER_K, FULL_DOC_SUMMARY_ID_KEY, PARENT_DOC_ID_KEY, SINGLE_TOKEN_LINE, SOURCE_KEY,
};
pub use grader::{LlmRelevanceGrader, RelevanceGrader};
pub use hash_embedder::HashEmbedder;
pub use in_memory::InMemoryFragmentStore;
pub use resolver::{HashMapResolver, KeyValueResolver};
pub use search::{FragmentSearch, SearchType};
