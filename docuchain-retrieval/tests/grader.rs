use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use docuchain_core::{DocuchainError, LlmRequest, LlmResponse, Runnable, StreamEvent};
use docuchain_retrieval::{LlmRelevanceGrader, RelevanceGrader, RetrievalError};

#[derive(Clone)]
struct CannedLlm {
    reply: Result<String, String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl CannedLlm {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Arc::default(),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err("rate limited".to_string()),
            prompts: Arc::default(),
        }
    }
}

#[async_trait]
impl Runnable<LlmRequest, LlmResponse> for CannedLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, DocuchainError> {
        let prompt = request
            .messages
            .iter()
            .map(|message| message.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        match &self.reply {
            Ok(content) => Ok(LlmResponse {
                content: content.clone(),
            }),
            Err(reason) => Err(DocuchainError::LlmProvider(reason.clone())),
        }
    }

    fn stream(&self, _request: LlmRequest) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        futures::stream::empty().boxed()
    }
}

#[tokio::test]
async fn yes_reply_is_relevant() {
    let llm = CannedLlm::replying("Yes, it mentions rent.");
    let prompts = llm.prompts.clone();
    let grader = LlmRelevanceGrader::new(llm);

    let relevant = grader
        .grade("what is the rent?", "A lease.", "Rent is $5,000.")
        .await
        .unwrap();
    assert!(relevant);

    let prompts = prompts.lock().unwrap();
    assert!(prompts[0].contains("what is the rent?"));
    assert!(prompts[0].contains("A lease."));
    assert!(prompts[0].contains("Rent is $5,000."));
}

#[tokio::test]
async fn no_reply_is_irrelevant() {
    let grader = LlmRelevanceGrader::new(CannedLlm::replying("No"));
    assert!(!grader.grade("q", "s", "f").await.unwrap());
}

#[tokio::test]
async fn custom_prompt_is_rendered() {
    let llm = CannedLlm::replying("TRUE");
    let prompts = llm.prompts.clone();
    let grader = LlmRelevanceGrader::new(llm)
        .with_model("grader-small")
        .with_prompt("Q={question} S={document_summary} C={retrieved_chunk}");
    assert!(grader.grade("q", "s", "c").await.unwrap());
    assert_eq!(prompts.lock().unwrap()[0], "Q=q S=s C=c");
}

#[tokio::test]
async fn llm_failure_is_a_grader_error() {
    let grader = LlmRelevanceGrader::new(CannedLlm::failing());
    let err = grader.grade("q", "s", "f").await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Grader(DocuchainError::LlmProvider(_))
    ));
}
