use async_trait::async_trait;
use tracing::debug;

use docuchain_agent::{Citation, CitationType, CitedAnswer, Invocation, Tool};
use docuchain_core::DocuchainError;
use docuchain_retrieval::FusedSummaryRetriever;

const RETRIEVAL_TOOL_PREFIX: &str = "search_";
const NO_RESULTS: &str = "No relevant documents were found.";

/// Tool name for searching a docset: lowercase alphanumerics with single
/// underscores, prefixed with `search_`.
pub fn retrieval_tool_function_name(docset_name: &str) -> String {
    let words: Vec<String> = docset_name
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect();
    format!("{RETRIEVAL_TOOL_PREFIX}{}", words.join("_"))
}

/// Exposes a [`FusedSummaryRetriever`] to agents. The answer is the fused
/// documents' text, with one citation per source document.
pub struct RetrievalTool {
    name: String,
    description: String,
    retriever: FusedSummaryRetriever,
}

impl RetrievalTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        retriever: FusedSummaryRetriever,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            retriever,
        }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: &str) -> Result<CitedAnswer, DocuchainError> {
        let docs = self
            .retriever
            .retrieve(input)
            .await
            .map_err(|err| DocuchainError::ToolCallFailed {
                tool_name: self.name.clone(),
                reason: err.to_string(),
            })?;
        debug!(tool = %self.name, documents = docs.len(), "retrieval tool finished");

        if docs.is_empty() {
            return Ok(CitedAnswer::new(self.name.clone(), NO_RESULTS));
        }
        let answer = docs
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .concat();
        let mut cited = CitedAnswer::new(self.name.clone(), answer);
        for doc in &docs {
            let source = doc.metadata_str(self.retriever.source_key()).unwrap_or_default();
            cited = cited.with_citation(Citation {
                label: source.to_string(),
                citation_type: CitationType::Document,
                file_name: Some(source.to_string()).filter(|name| !name.is_empty()),
                ..Citation::default()
            });
        }
        Ok(cited)
    }

    fn to_human_readable(&self, invocation: &Invocation) -> String {
        format!("Searching documents for: {}", invocation.tool_input)
    }
}
