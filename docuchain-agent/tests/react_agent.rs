use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use docuchain_agent::{
    run, run_stream, Agent, AgentError, AgentInput, CitedAnswer, ParseMode, ReActAgent, Tool,
};
use docuchain_core::{
    CallbackManager, DocuchainError, LlmRequest, LlmResponse, Role, RunConfig, RunType,
    Runnable, StreamEvent, TraceCollector,
};

#[derive(Default)]
struct ScriptedLlm {
    responses: Mutex<VecDeque<Vec<String>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<Vec<&str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|chunks| chunks.into_iter().map(String::from).collect())
                    .collect(),
            ),
            requests: Arc::default(),
        }
    }

    fn next(&self, request: LlmRequest) -> Vec<String> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Runnable<LlmRequest, LlmResponse> for ScriptedLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, DocuchainError> {
        Ok(LlmResponse {
            content: self.next(request).concat(),
        })
    }

    fn stream(&self, request: LlmRequest) -> BoxStream<'_, Result<StreamEvent, DocuchainError>> {
        let chunks = self.next(request);
        futures::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(StreamEvent::ContentChunk(chunk))),
        )
        .boxed()
    }
}

struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "evaluates arithmetic"
    }

    async fn run(&self, input: &str) -> Result<CitedAnswer, DocuchainError> {
        if input == "2+2" {
            Ok(CitedAnswer::new("calculator", "4"))
        } else {
            Err(DocuchainError::ToolCallFailed {
                tool_name: "calculator".to_string(),
                reason: format!("cannot evaluate {input}"),
            })
        }
    }
}

const ACTION_CHUNKS: [&str; 3] = [
    "Thought: I should add.\n```json\n",
    "{\"action\": \"calculator\", \"action_input\": \"2+2\"}\n",
    "```",
];

fn agent(llm: ScriptedLlm) -> ReActAgent<ScriptedLlm> {
    ReActAgent::builder()
        .llm(llm)
        .tool(Arc::new(Calculator))
        .max_iterations(3)
        .build()
        .unwrap()
}

#[tokio::test]
async fn tool_call_then_streamed_final_answer() {
    let llm = ScriptedLlm::new(vec![
        ACTION_CHUNKS.to_vec(),
        vec!["Thought: I know it.\nFinal Answer:", " The answer", " is 4"],
    ]);
    let requests = llm.requests.clone();
    let agent = agent(llm);

    let items: Vec<_> = run_stream(&agent, "what is 2+2?", Vec::new())
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(items.len(), 4);
    let requested = items[0].value.tool_invocation.as_ref().unwrap();
    assert_eq!(requested.tool_name, "calculator");
    assert_eq!(requested.tool_input, "2+2");

    assert!(items[1].value.tool_invocation.is_none());
    assert_eq!(items[1].value.intermediate_steps().len(), 1);
    assert_eq!(items[1].value.intermediate_steps()[0].output, "4");

    let streamed = items[2].value.cited_answer.as_ref().unwrap();
    assert_eq!(streamed.answer, "The answer is 4");
    assert_eq!(streamed.source, "ReActAgent");
    assert!(!streamed.is_final);

    let terminal = &items[3];
    assert!(terminal.value.is_final());
    assert!(terminal.run_id.is_some());

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert_eq!(last.content, "Observation: 4");
    assert!(requests[0].messages[0].content.contains("calculator: evaluates arithmetic"));
}

#[tokio::test]
async fn chat_history_is_replayed_by_speaker() {
    let llm = ScriptedLlm::new(vec![vec!["Final Answer: hello again"]]);
    let requests = llm.requests.clone();
    let agent = agent(llm);
    let history = vec![
        ("human".to_string(), "hi".to_string()),
        ("ai".to_string(), "hello".to_string()),
    ];

    let response = run(&agent, "remember me?", history).await.unwrap();
    assert_eq!(
        response.value.cited_answer.unwrap().answer,
        "hello again"
    );

    let requests = requests.lock().unwrap();
    let roles: Vec<_> = requests[0].messages.iter().map(|m| m.role.clone()).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
}

#[tokio::test]
async fn permissive_reply_without_marker_is_final() {
    let agent = agent(ScriptedLlm::new(vec![vec!["Paris is the capital."]]));
    let response = run(&agent, "capital of France?", Vec::new()).await.unwrap();
    let answer = response.value.cited_answer.unwrap();
    assert_eq!(answer.answer, "Paris is the capital.");
    assert!(answer.is_final);
    assert_eq!(response.value.question, "capital of France?");
}

#[tokio::test]
async fn strict_reply_without_marker_fails() {
    let agent = ReActAgent::builder()
        .llm(ScriptedLlm::new(vec![vec!["Paris is the capital."]]))
        .parse_mode(ParseMode::Strict)
        .build()
        .unwrap();
    let err = run(&agent, "capital of France?", Vec::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::Parse(_)));
}

#[tokio::test]
async fn gives_up_after_max_iterations() {
    let llm = ScriptedLlm::new(vec![ACTION_CHUNKS.to_vec(); 3]);
    let agent = agent(llm);
    let err = run(&agent, "what is 2+2?", Vec::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::MaxIterations { max: 3 }));
}

#[tokio::test]
async fn tool_failure_ends_the_run() {
    let llm = ScriptedLlm::new(vec![vec![
        "```json\n{\"action\": \"calculator\", \"action_input\": \"1/0\"}\n```",
    ]]);
    let agent = agent(llm);
    let err = run(&agent, "what is 1/0?", Vec::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::ToolExecution { .. }));
}

#[tokio::test]
async fn records_a_root_agent_run() {
    let collector = TraceCollector::new();
    let config = RunConfig::with_callbacks(CallbackManager::new(vec![Arc::new(
        collector.clone(),
    )]));
    let agent = agent(ScriptedLlm::new(vec![vec!["Final Answer: 4"]]));

    let events: Vec<_> = agent
        .stream_events(AgentInput::new("what is 2+2?", Vec::new()), config)
        .collect()
        .await;
    assert!(events.iter().all(|event| event.is_ok()));

    let runs = collector.traced_runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_type, RunType::Agent);
    assert_eq!(runs[0].name, "ReActAgent");
}

#[test]
fn builder_validates_configuration() {
    let missing_llm = ReActAgent::<ScriptedLlm>::builder().build();
    assert!(matches!(missing_llm, Err(DocuchainError::InvalidConfig(_))));

    let zero = ReActAgent::builder()
        .llm(ScriptedLlm::default())
        .max_iterations(0)
        .build();
    assert!(matches!(zero, Err(DocuchainError::InvalidConfig(_))));

    let duplicate = ReActAgent::builder()
        .llm(ScriptedLlm::default())
        .tools(vec![Arc::new(Calculator), Arc::new(Calculator)])
        .build();
    assert!(matches!(duplicate, Err(DocuchainError::InvalidConfig(_))));
}

#[test]
fn max_iterations_can_come_from_env() {
    std::env::set_var("DOCUCHAIN_TEST_MAX_ITERATIONS", "5");
    let agent = ReActAgent::builder()
        .llm(ScriptedLlm::default())
        .max_iterations_from_env("DOCUCHAIN_TEST_MAX_ITERATIONS")
        .build()
        .unwrap();
    assert_eq!(agent.max_iterations(), 5);
}
