//! The streaming event union emitted by the turn orchestrator.
//!
//! Within a turn, events are strictly ordered: tool events for a call id run
//! `started → output* → finished`; bubble events run `bubble_start → token+`;
//! all bubbles precede `assistant_done`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TurnEvent {
    Conversation {
        conversation_id: String,
    },
    AssistantBubbleStart {
        bubble_id: String,
    },
    Token {
        bubble_id: String,
        value: String,
    },
    ToolCallStarted {
        tool_call_id: String,
        name: String,
        args: serde_json::Value,
    },
    ToolCallOutput {
        tool_call_id: String,
        output: String,
    },
    ToolCallFinished {
        tool_call_id: String,
        ok: bool,
        output: serde_json::Value,
    },
    AssistantDone {
        conversation_id: String,
        message_ids: Vec<String>,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_type_tags() {
        let ev = TurnEvent::AssistantBubbleStart {
            bubble_id: "b1".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "assistant_bubble_start");
        assert_eq!(json["bubbleId"], "b1");

        let done = TurnEvent::AssistantDone {
            conversation_id: "c1".into(),
            message_ids: vec!["m1".into()],
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["type"], "assistant_done");
    }
}
