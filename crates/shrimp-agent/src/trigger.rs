//! One-shot trigger runs: wrap the turn orchestrator with a run lifecycle
//! and extract the machine-readable `<final_result>` from the transcript.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use shrimp_store::{Store, TriggerKind, TriggerRun};

use crate::turn::{TurnError, TurnOrchestrator, TurnRequest};

/// First 500 chars of the joined bubbles.
const RESULT_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub message: String,
    pub model: Option<String>,
    pub trigger: TriggerKind,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    pub run: TriggerRun,
    pub conversation_id: String,
    pub final_result: Option<String>,
    pub result_preview: String,
}

pub struct TriggerExecutor {
    store: Arc<Store>,
    orchestrator: Arc<TurnOrchestrator>,
}

impl TriggerExecutor {
    pub fn new(store: Arc<Store>, orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Execute a one-shot run. The run row is created up front as `running`
    /// and completed exactly once, whether the turn succeeds or fails.
    pub async fn run(&self, req: TriggerRequest) -> Result<TriggerOutcome, TurnError> {
        let payload_json = req
            .payload
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_else(|_| "null".to_string()));
        let run = self.store.create_trigger_run(
            req.trigger,
            &req.message,
            req.model.as_deref(),
            payload_json.as_deref(),
        )?;
        info!(run_id = %run.id, trigger = req.trigger.as_str(), "trigger run started");

        let synthesized = synthesize_run_message(&req.message, req.payload.as_ref());
        let turn = TurnRequest {
            message: synthesized,
            model: req.model.clone(),
            ..Default::default()
        };

        let outcome = match self
            .orchestrator
            .run_turn(turn, None, CancellationToken::new())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "trigger run failed");
                self.store
                    .complete_trigger_run(&run.id, false, None, None, Some(&e.to_string()))?;
                return Err(e);
            }
        };

        let full_text = outcome.bubbles.join("\n\n");
        let final_result = extract_final_result(&full_text);

        self.store
            .set_trigger_run_conversation_id(&run.id, &outcome.conversation_id)?;
        let output = serde_json::json!({
            "bubbles": outcome.bubbles,
            "conversationId": outcome.conversation_id,
            "finalResult": final_result,
        });
        let run = self.store.complete_trigger_run(
            &run.id,
            true,
            Some(&output.to_string()),
            final_result.as_deref(),
            None,
        )?;

        let result_preview: String = full_text.chars().take(RESULT_PREVIEW_CHARS).collect();
        info!(run_id = %run.id, has_final_result = final_result.is_some(), "trigger run complete");

        Ok(TriggerOutcome {
            run,
            conversation_id: outcome.conversation_id,
            final_result,
            result_preview,
        })
    }
}

/// The message handed to the turn engine: the instruction, the payload (when
/// given), and a reminder that the run is unattended.
fn synthesize_run_message(instruction: &str, payload: Option<&serde_json::Value>) -> String {
    let mut out = instruction.trim().to_string();
    if let Some(payload) = payload {
        let pretty =
            serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        out.push_str("\n\nInput payload:\n```json\n");
        out.push_str(&pretty);
        out.push_str("\n```");
    }
    out.push_str(
        "\n\nThis is an unattended run: nobody can answer questions. Use your \
         tools autonomously to finish the task. When done, wrap the \
         machine-readable result in <final_result>...</final_result>.",
    );
    out
}

/// Contents of the first `<final_result>` tag, whitespace-collapsed.
fn extract_final_result(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?is)<final_result>(.*?)</final_result>").unwrap()
    });
    re.captures(text).map(|caps| {
        caps.get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_tag_case_insensitively() {
        let text = "done\n<FINAL_RESULT>  /tmp/x.txt \n </FINAL_RESULT> and \
                    <final_result>second</final_result>";
        assert_eq!(extract_final_result(text).as_deref(), Some("/tmp/x.txt"));
    }

    #[test]
    fn collapses_internal_whitespace() {
        let text = "<final_result>a   b\n\nc</final_result>";
        assert_eq!(extract_final_result(text).as_deref(), Some("a b c"));
    }

    #[test]
    fn absent_tag_yields_none() {
        assert_eq!(extract_final_result("no tags here"), None);
    }

    #[test]
    fn run_message_includes_payload_and_reminder() {
        let payload = serde_json::json!({"ticket": 42});
        let msg = synthesize_run_message("Find X", Some(&payload));
        assert!(msg.starts_with("Find X"));
        assert!(msg.contains("\"ticket\": 42"));
        assert!(msg.contains("<final_result>"));

        let bare = synthesize_run_message("Find X", None);
        assert!(!bare.contains("Input payload"));
    }
}
