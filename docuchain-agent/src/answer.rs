//! Rules that spot a final answer inside partially generated text.

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

const ANSWER_FIELD: &str = "\"answer\"";

/// How a backend marks its final answer in generated text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FinalAnswerRule {
    /// Text after the last `Final Answer:` marker.
    #[default]
    ReActMarker,
    /// The `"answer"` string field of a cited-answer JSON object.
    JsonAnswerField,
}

impl FinalAnswerRule {
    pub fn extract(&self, text: &str) -> Option<String> {
        match self {
            FinalAnswerRule::ReActMarker => react_final_answer(text),
            FinalAnswerRule::JsonAnswerField => json_answer_field(text),
        }
    }
}

pub fn react_final_answer(text: &str) -> Option<String> {
    let (_, answer) = text.rsplit_once(FINAL_ANSWER_MARKER)?;
    non_empty(answer.trim())
}

/// Reads the `"answer"` field out of a JSON object that may still be
/// streaming. An unterminated string yields what has arrived so far.
pub fn json_answer_field(text: &str) -> Option<String> {
    let start = text.find(ANSWER_FIELD)? + ANSWER_FIELD.len();
    let rest = text[start..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let rest = rest.strip_prefix('"')?;

    let mut answer = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => answer.push('\n'),
                Some('t') => answer.push('\t'),
                Some('r') => answer.push('\r'),
                Some('b') => answer.push('\u{8}'),
                Some('f') => answer.push('\u{c}'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if hex.len() < 4 {
                        break;
                    }
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(decoded) => answer.push(decoded),
                        None => answer.push(char::REPLACEMENT_CHARACTER),
                    }
                }
                Some(other) => answer.push(other),
                // escape split across chunks
                None => break,
            },
            other => answer.push(other),
        }
    }
    non_empty(answer.trim())
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
