use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::{DocuchainError, LlmResponse, Runnable, StreamEvent};

/// A parser that converts `LlmResponse` or `String` into a `String`.
#[derive(Clone, Default)]
pub struct StrOutputParser;

#[async_trait]
impl Runnable<LlmResponse, String> for StrOutputParser {
    async fn invoke(&self, input: LlmResponse) -> Result<String, DocuchainError> {
        Ok(input.content)
    }

    fn stream(&self, input: LlmResponse) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        futures::stream::once(async move { Ok(StreamEvent::ContentChunk(input.content)) }).boxed()
    }
}

#[async_trait]
impl Runnable<String, String> for StrOutputParser {
    async fn invoke(&self, input: String) -> Result<String, DocuchainError> {
        Ok(input)
    }

    fn stream(&self, input: String) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        futures::stream::once(async move { Ok(StreamEvent::ContentChunk(input)) }).boxed()
    }
}

const TRUTHY_STRINGS: [&str; 2] = ["true", "yes"];

/// Reads free-form model output as a boolean: true when the lowercased
/// text contains any truthy marker anywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct TruthyOutputParser;

impl TruthyOutputParser {
    pub fn parse(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        TRUTHY_STRINGS.iter().any(|marker| text.contains(marker))
    }
}

#[async_trait]
impl Runnable<String, bool> for TruthyOutputParser {
    async fn invoke(&self, input: String) -> Result<bool, DocuchainError> {
        Ok(self.parse(&input))
    }

    fn stream(&self, input: String) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        let verdict = self.parse(&input);
        futures::stream::once(async move {
            Ok(StreamEvent::Metadata {
                key: "truthy".to_string(),
                value: crate::Value::Bool(verdict),
            })
        })
        .boxed()
    }
}

#[async_trait]
impl Runnable<LlmResponse, bool> for TruthyOutputParser {
    async fn invoke(&self, input: LlmResponse) -> Result<bool, DocuchainError> {
        Ok(self.parse(&input.content))
    }

    fn stream(&self, input: LlmResponse) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        Runnable::<String, bool>::stream(self, input.content)
    }
}
