//! Turn-engine scenarios driven by a scripted provider and a throwaway
//! store, with the real tool registry underneath.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shrimp_agent::memory::PromptMemory;
use shrimp_agent::provider::{
    AssistantReply, ChatProvider, ChatRequest, ProviderError, ToolInvocation,
};
use shrimp_agent::tools::ToolRegistry;
use shrimp_agent::{
    ModelPolicy, TriggerExecutor, TriggerRequest, TurnError, TurnEvent, TurnOrchestrator,
    TurnRequest,
};
use shrimp_shell::{ShellManager, ShellManagerConfig};
use shrimp_store::{Role, RunStatus, Store, ToolCallStatus, TriggerKind};

enum Scripted {
    Reply(AssistantReply),
    Fail(String),
}

/// Provider that plays back a fixed script of rounds.
struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _req: &ChatRequest,
    ) -> Result<Option<AssistantReply>, ProviderError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Reply(reply)) => Ok(Some(reply)),
            Some(Scripted::Fail(message)) => Err(ProviderError::Api {
                status: 500,
                message,
            }),
            None => Ok(None),
        }
    }
}

struct Harness {
    store: Arc<Store>,
    orchestrator: Arc<TurnOrchestrator>,
    _dir: tempfile::TempDir,
}

fn harness(script: Vec<Scripted>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap());
    let shell = Arc::new(ShellManager::new(ShellManagerConfig::default()));
    let memory = Arc::new(PromptMemory::new(dir.path().join("memory.json")));
    let orchestrator = Arc::new(TurnOrchestrator::new(
        Arc::clone(&store),
        Arc::new(ScriptedProvider::new(script)),
        ToolRegistry::new(shell, Arc::clone(&memory)),
        memory,
        ModelPolicy {
            default_model: "gpt-4.1-mini".into(),
            allowed: vec!["gpt-4o".into()],
        },
    ));
    Harness {
        store,
        orchestrator,
        _dir: dir,
    }
}

fn text_reply(content: &str) -> Scripted {
    Scripted::Reply(AssistantReply {
        content: Some(content.to_string()),
        tool_calls: Vec::new(),
    })
}

async fn run_with_events(
    harness: &Harness,
    req: TurnRequest,
) -> (Result<shrimp_agent::TurnOutcome, TurnError>, Vec<TurnEvent>) {
    let (tx, mut rx) = mpsc::channel(1024);
    let result = harness
        .orchestrator
        .run_turn(req, Some(tx), CancellationToken::new())
        .await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (result, events)
}

#[tokio::test]
async fn simple_echo_streams_one_bubble() {
    let harness = harness(vec![text_reply("hi there.")]);
    let (result, events) = run_with_events(
        &harness,
        TurnRequest {
            message: "say hi".into(),
            ..Default::default()
        },
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(outcome.bubbles, vec!["hi there."]);

    assert!(matches!(events[0], TurnEvent::Conversation { .. }));
    assert!(matches!(events[1], TurnEvent::AssistantBubbleStart { .. }));
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Token { value, .. } => Some(value.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "hi there.");
    assert!(matches!(events.last(), Some(TurnEvent::AssistantDone { .. })));

    let messages = harness.store.list_messages(&outcome.conversation_id).unwrap();
    let assistant_count = messages.iter().filter(|m| m.role == Role::Assistant).count();
    assert_eq!(assistant_count, 1);
}

#[tokio::test]
async fn first_user_message_titles_the_conversation() {
    let harness = harness(vec![text_reply("ok.")]);
    let (result, _) = run_with_events(
        &harness,
        TurnRequest {
            message: "  help me   organize\nmy notes  ".into(),
            ..Default::default()
        },
    )
    .await;
    let outcome = result.unwrap();
    let conversation = harness.store.get_conversation(&outcome.conversation_id).unwrap();
    assert_eq!(conversation.title, "help me organize my notes");
}

#[tokio::test]
async fn whitespace_only_message_is_rejected() {
    let harness = harness(vec![]);
    let result = harness
        .orchestrator
        .run_turn(
            TurnRequest {
                message: "   \n ".into(),
                ..Default::default()
            },
            None,
            CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(TurnError::BadRequest(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn command_round_trip_persists_tool_call() {
    let harness = harness(vec![
        Scripted::Reply(AssistantReply {
            content: None,
            tool_calls: vec![ToolInvocation {
                id: "call_1".into(),
                name: "run_command".into(),
                arguments: "{\"command\":\"echo shrimp\"}".into(),
            }],
        }),
        text_reply("Got: shrimp"),
    ]);

    let (result, events) = run_with_events(
        &harness,
        TurnRequest {
            message: "echo shrimp and tell me".into(),
            ..Default::default()
        },
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(outcome.bubbles, vec!["Got: shrimp"]);

    let started = events
        .iter()
        .position(|e| matches!(e, TurnEvent::ToolCallStarted { .. }))
        .unwrap();
    let finished = events
        .iter()
        .position(|e| matches!(e, TurnEvent::ToolCallFinished { .. }))
        .unwrap();
    assert!(started < finished);
    match &events[finished] {
        TurnEvent::ToolCallFinished { ok, output, .. } => {
            assert!(*ok);
            assert_eq!(output["exitCode"], 0);
            assert!(output["stdout"].as_str().unwrap().contains("shrimp"));
        }
        _ => unreachable!(),
    }

    let records = harness.store.list_tool_calls(&outcome.conversation_id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ToolCallStatus::Success);
    assert_eq!(records[0].tool_name, "run_command");
}

#[tokio::test]
async fn tool_failure_is_recorded_and_loop_continues() {
    let harness = harness(vec![
        Scripted::Reply(AssistantReply {
            content: None,
            tool_calls: vec![ToolInvocation {
                id: "call_1".into(),
                name: "read_file".into(),
                arguments: "{\"path\":\"/no/such/file\"}".into(),
            }],
        }),
        text_reply("That file does not exist."),
    ]);

    let (result, events) = run_with_events(
        &harness,
        TurnRequest {
            message: "read it".into(),
            ..Default::default()
        },
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(outcome.bubbles, vec!["That file does not exist."]);

    let finished = events
        .iter()
        .find_map(|e| match e {
            TurnEvent::ToolCallFinished { ok, output, .. } => Some((*ok, output.clone())),
            _ => None,
        })
        .unwrap();
    assert!(!finished.0);
    assert!(finished.1["error"].as_str().is_some());

    let records = harness.store.list_tool_calls(&outcome.conversation_id).unwrap();
    assert_eq!(records[0].status, ToolCallStatus::Error);
}

#[tokio::test]
async fn garbled_arguments_become_empty_object() {
    let harness = harness(vec![
        Scripted::Reply(AssistantReply {
            content: None,
            tool_calls: vec![ToolInvocation {
                id: "call_1".into(),
                name: "list_system_prompt_memory".into(),
                arguments: "{not json".into(),
            }],
        }),
        text_reply("Memory is empty."),
    ]);

    let (result, _) = run_with_events(
        &harness,
        TurnRequest {
            message: "what do you remember?".into(),
            ..Default::default()
        },
    )
    .await;
    // The tolerant parse keeps the loop alive and the tool succeeds.
    let outcome = result.unwrap();
    let records = harness.store.list_tool_calls(&outcome.conversation_id).unwrap();
    assert_eq!(records[0].status, ToolCallStatus::Success);
}

#[tokio::test]
async fn silent_round_falls_back_to_done_bubble() {
    // Provider returns no assistant message at all.
    let harness = harness(vec![]);
    let (result, _) = run_with_events(
        &harness,
        TurnRequest {
            message: "anything".into(),
            ..Default::default()
        },
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(outcome.bubbles, vec!["Done."]);
}

#[tokio::test]
async fn upstream_failure_surfaces_and_persists_nothing_assistant() {
    let harness = harness(vec![Scripted::Fail("upstream down".into())]);
    let (result, events) = run_with_events(
        &harness,
        TurnRequest {
            message: "hello?".into(),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(TurnError::Upstream(_))));

    match events.last().unwrap() {
        TurnEvent::Error { message } => assert!(message.contains("upstream down")),
        other => panic!("expected error event, got {other:?}"),
    }

    let conversations = harness.store.list_conversations().unwrap();
    let messages = harness.store.list_messages(&conversations[0].id).unwrap();
    assert!(messages.iter().all(|m| m.role == Role::User));
}

#[tokio::test]
async fn trigger_run_extracts_final_result() {
    let harness = harness(vec![text_reply(
        "Wrote the file.\n\n<final_result>/tmp/x.txt</final_result>",
    )]);
    let executor = TriggerExecutor::new(
        Arc::clone(&harness.store),
        Arc::clone(&harness.orchestrator),
    );

    let outcome = executor
        .run(TriggerRequest {
            message: "Find X".into(),
            model: None,
            trigger: TriggerKind::Manual,
            payload: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.final_result.as_deref(), Some("/tmp/x.txt"));
    assert!(outcome.result_preview.starts_with("Wrote the file."));

    let stored = harness.store.get_trigger_run(&outcome.run.id).unwrap();
    assert_eq!(stored.status, RunStatus::Success);
    assert_eq!(stored.final_result.as_deref(), Some("/tmp/x.txt"));
    assert_eq!(
        stored.conversation_id.as_deref(),
        Some(outcome.conversation_id.as_str())
    );
}

#[tokio::test]
async fn failed_trigger_run_is_marked_error() {
    let harness = harness(vec![Scripted::Fail("upstream down".into())]);
    let executor = TriggerExecutor::new(
        Arc::clone(&harness.store),
        Arc::clone(&harness.orchestrator),
    );

    let result = executor
        .run(TriggerRequest {
            message: "Find X".into(),
            model: None,
            trigger: TriggerKind::Api,
            payload: Some(serde_json::json!({"k": "v"})),
        })
        .await;
    assert!(result.is_err());

    let runs = harness.store.list_trigger_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Error);
    assert!(runs[0].error.as_deref().unwrap().contains("upstream down"));
}
