use async_trait::async_trait;
use docuchain_core::Document;
use serde::{Deserialize, Serialize};

use crate::RetrievalError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Similarity,
    /// Maximal marginal relevance reranking of a similarity search.
    #[default]
    Mmr,
}

/// A store that returns ranked fragments for a query.
#[async_trait]
pub trait FragmentSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        search_type: SearchType,
        k: usize,
    ) -> Result<Vec<Document>, RetrievalError>;
}
