use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;

use docuchain_agent::{
    chat_history_to_str, steps_to_str, AgentError, AgentState, CitedAnswer,
    HumanInterventionTool, Invocation, SmallTalkTool, StepState, Tool, ToolExecutor, THINKING,
};
use docuchain_core::{DocuchainError, LlmRequest, LlmResponse, Role, Runnable, StreamEvent};

struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "adds numbers"
    }

    async fn run(&self, input: &str) -> Result<CitedAnswer, DocuchainError> {
        let sum: i64 = input
            .split('+')
            .map(|part| part.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| DocuchainError::ToolCallFailed {
                tool_name: "calculator".to_string(),
                reason: err.to_string(),
            })?
            .into_iter()
            .sum();
        Ok(CitedAnswer::new("calculator", sum.to_string()))
    }
}

fn pending(tool_name: &str, tool_input: &str) -> AgentState {
    let mut state = AgentState::new("q", Vec::new());
    state.tool_invocation = Some(Invocation {
        tool_name: tool_name.to_string(),
        tool_input: tool_input.to_string(),
        log: String::new(),
    });
    state
}

fn executor() -> ToolExecutor {
    let mut executor = ToolExecutor::new();
    executor.register(Arc::new(Calculator)).unwrap();
    executor.register(Arc::new(HumanInterventionTool)).unwrap();
    executor
}

#[tokio::test]
async fn executes_pending_invocation() {
    let step = executor().execute(&pending("calculator", "2+2")).await.unwrap();
    assert_eq!(step.output, "4");
    assert_eq!(step.invocation.tool_input, "2+2");
}

#[tokio::test]
async fn missing_invocation_is_missing_input() {
    let err = executor()
        .execute(&AgentState::new("q", Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::MissingInput("tool_invocation")));
}

#[tokio::test]
async fn unknown_tool_fails() {
    let err = executor()
        .execute(&pending("weather", "paris"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::ToolExecution { ref tool_name, .. } if tool_name == "weather"
    ));
}

#[tokio::test]
async fn tool_failure_is_propagated() {
    let err = executor().execute(&pending("calculator", "two+2")).await.unwrap_err();
    match err {
        AgentError::ToolExecution { tool_name, source } => {
            assert_eq!(tool_name, "calculator");
            assert!(matches!(source, DocuchainError::ToolCallFailed { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_tool_names_are_rejected() {
    let mut executor = executor();
    let err = executor.register(Arc::new(Calculator)).unwrap_err();
    assert!(matches!(err, DocuchainError::InvalidConfig(_)));
}

#[tokio::test]
async fn human_intervention_returns_fixed_answer() {
    let answer = HumanInterventionTool.run("anything").await.unwrap();
    assert_eq!(answer.source, "human_intervention");
    assert!(answer.answer.starts_with("Sorry, I don't have enough information"));
}

#[test]
fn human_readable_status_follows_state() {
    let executor = executor();
    assert_eq!(
        executor.to_human_readable(&AgentState::new("q", Vec::new())),
        THINKING
    );
    assert_eq!(
        executor.to_human_readable(&pending("calculator", "2+2")),
        "Invoking calculator with input: 2+2"
    );
    assert_eq!(
        executor.to_human_readable(&AgentState::answer_only("agent", "4")),
        "4"
    );
}

#[derive(Default)]
struct GreetingLlm {
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

#[async_trait]
impl Runnable<LlmRequest, LlmResponse> for GreetingLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, DocuchainError> {
        self.requests.lock().unwrap().push(request);
        Ok(LlmResponse {
            content: "  Hello! How can I help you today?\n".to_string(),
        })
    }

    fn stream(&self, _request: LlmRequest) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        Box::pin(futures::stream::empty())
    }
}

#[tokio::test]
async fn small_talk_answers_from_the_llm() {
    let llm = GreetingLlm::default();
    let requests = llm.requests.clone();
    let tool = SmallTalkTool::new(llm).with_model("small-model");

    assert_eq!(tool.name(), "small_talk");
    assert!(tool.description().contains("general knowledge"));

    let answer = tool.run("hi there").await.unwrap();
    assert_eq!(answer.source, "small_talk");
    assert_eq!(answer.answer, "Hello! How can I help you today?");
    assert!(answer.citations.is_empty());

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "small-model");
    let user = requests[0].messages.last().unwrap();
    assert_eq!(user.role, Role::User);
    assert_eq!(user.content, "hi there");
}

#[test]
fn history_rendering() {
    let history = vec![
        ("human".to_string(), "hi".to_string()),
        ("ai".to_string(), " hello ".to_string()),
    ];
    assert_eq!(chat_history_to_str(&history), "human: hi\nai: hello");

    let steps = vec![StepState {
        invocation: Invocation {
            tool_name: "calculator".to_string(),
            tool_input: "2+2".to_string(),
            log: String::new(),
        },
        output: "4".to_string(),
    }];
    assert_eq!(
        steps_to_str(&steps),
        "Tool: calculator\nTool Input: 2+2\nTool Output: 4"
    );
}
