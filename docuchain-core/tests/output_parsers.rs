use docuchain_core::{LlmResponse, Runnable, StrOutputParser, TruthyOutputParser};

#[tokio::test]
async fn test_str_output_parser() {
    let parser = StrOutputParser;

    let output = parser.invoke("Hello world".to_string()).await.unwrap();
    assert_eq!(output, "Hello world");

    let response = LlmResponse {
        content: "Hello from LLM".to_string(),
    };
    let output = parser.invoke(response).await.unwrap();
    assert_eq!(output, "Hello from LLM");
}

#[tokio::test]
async fn truthy_parser_matches_markers_case_insensitively() {
    let parser = TruthyOutputParser;

    assert!(parser.invoke("TRUE".to_string()).await.unwrap());
    assert!(parser.invoke("Yes, it is relevant.".to_string()).await.unwrap());
    assert!(!parser.invoke("No".to_string()).await.unwrap());
    assert!(!parser.invoke(String::new()).await.unwrap());
}

#[tokio::test]
async fn truthy_parser_accepts_llm_response() {
    let parser = TruthyOutputParser;
    let response = LlmResponse {
        content: "The chunk is relevant: true".to_string(),
    };
    assert!(Runnable::<LlmResponse, bool>::invoke(&parser, response)
        .await
        .unwrap());
}

#[test]
fn truthy_parser_is_a_substring_match() {
    // "untrue" still contains the marker; the parser is deliberately naive.
    assert!(TruthyOutputParser.parse("untrue"));
    assert!(!TruthyOutputParser.parse("false"));
}
