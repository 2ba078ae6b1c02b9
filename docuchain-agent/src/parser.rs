use std::sync::OnceLock;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use regex::Regex;

use docuchain_core::{DocuchainError, Runnable, StreamEvent, Value};

use crate::answer::FINAL_ANSWER_MARKER;
use crate::{Invocation, OutputParseError};

const FENCED_ACTION_PATTERN: &str = r"(?s)^.*?`{3}(?:json)?\n?(.*?)`{3}.*?$";
const SIMPLE_JSON_PATTERN: &str =
    r#"(\{(?:\s*"[^"]+?"\s*:\s*(?:"[^"]*?"|\d+|\[\])\s*,?\s*)+\})"#;

fn fenced_action() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FENCED_ACTION_PATTERN).expect("fenced action pattern is valid"))
}

fn simple_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SIMPLE_JSON_PATTERN).expect("simple json pattern is valid"))
}

/// What to do with output that holds neither an action nor a marked answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Reject it.
    Strict,
    /// Take the whole text as the answer.
    #[default]
    Permissive,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedOutput {
    Invocation(Invocation),
    FinalAnswer(String),
}

/// Parses ReAct-style model output where actions are JSON blobs like
/// `{"action": "search", "action_input": "2+2"}`, optionally fenced.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReActJsonOutputParser {
    mode: ParseMode,
}

impl ReActJsonOutputParser {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    pub fn strict() -> Self {
        Self::new(ParseMode::Strict)
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn parse(&self, text: &str) -> Result<ParsedOutput, OutputParseError> {
        let includes_answer = text.contains(FINAL_ANSWER_MARKER);
        let action =
            find_action(fenced_action(), text).or_else(|| find_action(simple_json(), text));

        if let Some((tool_name, tool_input)) = action {
            if includes_answer {
                return Err(OutputParseError::ConflictingOutput {
                    text: text.to_string(),
                });
            }
            return Ok(ParsedOutput::Invocation(Invocation {
                tool_name,
                tool_input,
                log: text.to_string(),
            }));
        }

        if !includes_answer && self.mode == ParseMode::Strict {
            return Err(OutputParseError::UnparsableOutput {
                text: text.to_string(),
            });
        }
        let answer = text
            .rsplit_once(FINAL_ANSWER_MARKER)
            .map_or(text, |(_, after)| after);
        Ok(ParsedOutput::FinalAnswer(answer.trim().to_string()))
    }
}

fn find_action(pattern: &Regex, text: &str) -> Option<(String, String)> {
    let blob = pattern.captures(text)?.get(1)?.as_str().trim();
    let value: Value = serde_json::from_str(blob).ok()?;
    let action = value.get("action")?.as_str()?.trim();
    if action.is_empty() {
        return None;
    }
    let tool_input = match value.get("action_input") {
        Some(Value::String(input)) => input.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Some((action.to_string(), tool_input))
}

#[async_trait]
impl Runnable<String, ParsedOutput> for ReActJsonOutputParser {
    async fn invoke(&self, input: String) -> Result<ParsedOutput, DocuchainError> {
        self.parse(&input)
            .map_err(|err| DocuchainError::ParseFailed {
                output: input.clone(),
                reason: err.to_string(),
            })
    }

    fn stream(&self, input: String) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        let parsed = Runnable::<String, ParsedOutput>::invoke(self, input);
        futures::stream::once(async move {
            match parsed.await? {
                ParsedOutput::FinalAnswer(answer) => Ok(StreamEvent::FinalAnswer(answer)),
                ParsedOutput::Invocation(invocation) => Ok(StreamEvent::Metadata {
                    key: "action".to_string(),
                    value: serde_json::to_value(&invocation)?,
                }),
            }
        })
        .boxed()
    }
}
