use std::error::Error;

use docuchain_core::{DocuchainError, EmbeddingError, TryFromValue, Value};

#[test]
fn error_display_for_llm_provider() {
    let err = DocuchainError::LlmProvider("rate limited".to_string());
    assert_eq!(format!("{err}"), "LLM provider failed: rate limited");
}

#[test]
fn error_display_for_tool_call_failed() {
    let err = DocuchainError::ToolCallFailed {
        tool_name: "search".to_string(),
        reason: "timeout".to_string(),
    };
    assert_eq!(format!("{err}"), "Tool call failed for 'search': timeout");
}

#[test]
fn embedding_error_converts_into_custom() {
    let err: DocuchainError = EmbeddingError::Provider("quota exceeded".to_string()).into();
    assert_eq!(format!("{err}"), "Embedding provider error: quota exceeded");
}

#[test]
fn embedding_error_other_exposes_source() {
    let inner = std::io::Error::new(std::io::ErrorKind::Other, "disk");
    let err = EmbeddingError::Other(Box::new(inner));
    assert!(err.source().is_some());
}

#[test]
fn try_from_value_reports_serde_errors() {
    let err = <Vec<String>>::try_from_value(Value::Bool(true)).unwrap_err();
    assert!(matches!(err, DocuchainError::Serde(_)));
}
