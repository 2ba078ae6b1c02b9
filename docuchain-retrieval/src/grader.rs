use async_trait::async_trait;
use tracing::debug;

use docuchain_core::{LlmRequest, LlmResponse, Message, Runnable, TruthyOutputParser};

use crate::RetrievalError;

/// Decides whether a retrieved fragment is relevant to a query, given the
/// summary of the document it came from.
#[async_trait]
pub trait RelevanceGrader: Send + Sync {
    async fn grade(
        &self,
        query: &str,
        summary: &str,
        fragment: &str,
    ) -> Result<bool, RetrievalError>;
}

const GRADER_PROMPT: &str = r#"You are a grader assessing whether a retrieved chunk of a document is relevant to a user question.

Here is the summary of the document the chunk was retrieved from:
{document_summary}

Here is the retrieved chunk:
{retrieved_chunk}

Here is the user question:
{question}

If the chunk, read in the context of the document summary, contains keywords or meaning related to the question, grade it as relevant. The goal is to filter out erroneous retrievals, so the test does not need to be stringent.

Answer with a single word: "yes" if the chunk is relevant, "no" otherwise."#;

/// Grades relevance by asking an LLM and reading a yes/no verdict from its
/// reply.
pub struct LlmRelevanceGrader<L> {
    llm: L,
    model: String,
    prompt_template: String,
    parser: TruthyOutputParser,
}

impl<L> LlmRelevanceGrader<L>
where
    L: Runnable<LlmRequest, LlmResponse> + Send + Sync,
{
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            model: String::new(),
            prompt_template: GRADER_PROMPT.to_string(),
            parser: TruthyOutputParser,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces the prompt. The template may use `{question}`,
    /// `{document_summary}` and `{retrieved_chunk}` placeholders.
    pub fn with_prompt(mut self, prompt_template: impl Into<String>) -> Self {
        self.prompt_template = prompt_template.into();
        self
    }

    fn render(&self, query: &str, summary: &str, fragment: &str) -> String {
        self.prompt_template
            .replace("{document_summary}", summary)
            .replace("{retrieved_chunk}", fragment)
            .replace("{question}", query)
    }
}

#[async_trait]
impl<L> RelevanceGrader for LlmRelevanceGrader<L>
where
    L: Runnable<LlmRequest, LlmResponse> + Send + Sync,
{
    async fn grade(
        &self,
        query: &str,
        summary: &str,
        fragment: &str,
    ) -> Result<bool, RetrievalError> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![Message::user(self.render(query, summary, fragment))],
            stop: Vec::new(),
        };
        let response = self
            .llm
            .invoke(request)
            .await
            .map_err(RetrievalError::Grader)?;
        let relevant = self.parser.parse(&response.content);
        debug!(relevant, "fragment graded");
        Ok(relevant)
    }
}
