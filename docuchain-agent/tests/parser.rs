use docuchain_agent::{OutputParseError, ParseMode, ParsedOutput, ReActJsonOutputParser};
use docuchain_core::{DocuchainError, Runnable, StreamEvent};
use futures::StreamExt;

fn invocation(output: ParsedOutput) -> (String, String) {
    match output {
        ParsedOutput::Invocation(invocation) => (invocation.tool_name, invocation.tool_input),
        other => panic!("expected invocation, got {other:?}"),
    }
}

#[test]
fn fenced_action_block_parses_to_invocation() {
    let parser = ReActJsonOutputParser::default();
    let text = "```json\n{\"action\": \"search\", \"action_input\": \"x\"}\n```";
    let output = parser.parse(text).unwrap();
    assert_eq!(invocation(output.clone()), ("search".to_string(), "x".to_string()));
    match output {
        ParsedOutput::Invocation(invocation) => assert_eq!(invocation.log, text),
        _ => unreachable!(),
    }
}

#[test]
fn fence_without_language_tag_is_accepted() {
    let parser = ReActJsonOutputParser::strict();
    let text = "Thought: look it up\n```\n{\"action\": \"search\", \"action_input\": \"rust\"}\n```\nwaiting";
    assert_eq!(
        invocation(parser.parse(text).unwrap()),
        ("search".to_string(), "rust".to_string())
    );
}

#[test]
fn marker_without_action_parses_to_answer() {
    let parser = ReActJsonOutputParser::strict();
    assert_eq!(
        parser.parse("Final Answer: 42").unwrap(),
        ParsedOutput::FinalAnswer("42".to_string())
    );
}

#[test]
fn answer_is_taken_after_last_marker() {
    let parser = ReActJsonOutputParser::default();
    let text = "Final Answer: maybe\nThought: check again\nFinal Answer:  surely \n";
    assert_eq!(
        parser.parse(text).unwrap(),
        ParsedOutput::FinalAnswer("surely".to_string())
    );
}

#[test]
fn action_and_marker_together_conflict() {
    let parser = ReActJsonOutputParser::default();
    let text = "```json\n{\"action\": \"search\", \"action_input\": \"x\"}\n```\nFinal Answer: 42";
    assert!(matches!(
        parser.parse(text),
        Err(OutputParseError::ConflictingOutput { .. })
    ));
}

#[test]
fn bare_json_object_is_found_without_fence() {
    let parser = ReActJsonOutputParser::strict();
    let text = "I will search. {\"action\": \"search\", \"action_input\": \"docs\"} then wait";
    assert_eq!(
        invocation(parser.parse(text).unwrap()),
        ("search".to_string(), "docs".to_string())
    );
}

#[test]
fn non_string_action_input_is_serialized() {
    let parser = ReActJsonOutputParser::default();
    let text = "```json\n{\"action\": \"lookup\", \"action_input\": {\"id\": 7}}\n```";
    assert_eq!(
        invocation(parser.parse(text).unwrap()),
        ("lookup".to_string(), "{\"id\":7}".to_string())
    );
}

#[test]
fn missing_action_input_becomes_empty() {
    let parser = ReActJsonOutputParser::default();
    let text = "```json\n{\"action\": \"list_reports\"}\n```";
    assert_eq!(
        invocation(parser.parse(text).unwrap()),
        ("list_reports".to_string(), String::new())
    );
}

#[test]
fn permissive_mode_takes_whole_text_as_answer() {
    let parser = ReActJsonOutputParser::new(ParseMode::Permissive);
    assert_eq!(
        parser.parse("  The capital is Paris.  ").unwrap(),
        ParsedOutput::FinalAnswer("The capital is Paris.".to_string())
    );
}

#[test]
fn strict_mode_rejects_unmarked_text() {
    let parser = ReActJsonOutputParser::strict();
    assert!(matches!(
        parser.parse("The capital is Paris."),
        Err(OutputParseError::UnparsableOutput { .. })
    ));
}

#[test]
fn fenced_block_without_action_falls_back_to_answer() {
    let parser = ReActJsonOutputParser::default();
    let text = "```json\n{\"answer\": \"no tool\"}\n```";
    assert!(matches!(parser.parse(text), Ok(ParsedOutput::FinalAnswer(_))));
    assert!(ReActJsonOutputParser::strict().parse(text).is_err());
}

#[tokio::test]
async fn runnable_invoke_maps_errors() {
    let parser = ReActJsonOutputParser::strict();
    let err = Runnable::<String, ParsedOutput>::invoke(&parser, "no answer here".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, DocuchainError::ParseFailed { .. }));
}

#[tokio::test]
async fn runnable_stream_emits_final_answer() {
    let parser = ReActJsonOutputParser::default();
    let events: Vec<_> =
        Runnable::<String, ParsedOutput>::stream(&parser, "Final Answer: 42".to_string())
            .collect()
            .await;
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].as_ref().unwrap(),
        &StreamEvent::FinalAnswer("42".to_string())
    );
}
