//! Conversation history and LLM context shaping
//!
//! The history is caller-owned and never persisted. Tool results are stored
//! in full (the UI renders every row) and only sampled when the history is
//! turned back into LLM context by [`ConversationHistory::to_context`].

use crate::error::HistoryError;
use crate::gateway::NO_RESULT_ID;
use crate::shaper::sample_default;
use crate::tools::{ToolCallOutcome, ToolRouter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// One tool call issued during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
    /// `None` while the call is in flight
    pub outcome: Option<ToolCallOutcome>,
}

/// A user message and everything the assistant did in response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub user: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub assistant: Option<String>,
}

impl Turn {
    /// Correlation id for feedback on this turn: the first tool result that
    /// carries one, otherwise `"-"`.
    pub fn result_id(&self) -> String {
        self.tool_calls
            .iter()
            .filter_map(|call| call.outcome.as_ref())
            .filter(|outcome| !outcome.is_error)
            .filter_map(|outcome| outcome.value.get("result_id").and_then(Value::as_str))
            .find(|id| !id.is_empty() && *id != NO_RESULT_ID)
            .unwrap_or(NO_RESULT_ID)
            .to_string()
    }

    fn pending_call(&self) -> Option<&ToolCallRecord> {
        self.tool_calls.iter().find(|c| c.outcome.is_none())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn turn(&self, id: Uuid) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    /// Start a new turn. Fails while a tool call of the previous turn is
    /// still unresolved.
    pub fn begin_turn(&mut self, user: impl Into<String>) -> Result<Uuid, HistoryError> {
        if let Some(pending) = self.turns.last().and_then(Turn::pending_call) {
            return Err(HistoryError::PendingToolCall {
                call_id: pending.call_id.clone(),
            });
        }
        let id = Uuid::new_v4();
        self.turns.push(Turn {
            id,
            user: user.into(),
            tool_calls: Vec::new(),
            assistant: None,
        });
        Ok(id)
    }

    fn current_mut(&mut self) -> Result<&mut Turn, HistoryError> {
        self.turns.last_mut().ok_or(HistoryError::NoActiveTurn)
    }

    /// Register a tool call issued by the runtime in the current turn
    pub fn record_tool_call(
        &mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
    ) -> Result<(), HistoryError> {
        let turn = self.current_mut()?;
        turn.tool_calls.push(ToolCallRecord {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            args,
            outcome: None,
        });
        Ok(())
    }

    /// Attach a result to a call of the current turn
    pub fn attach_result(
        &mut self,
        call_id: &str,
        outcome: ToolCallOutcome,
    ) -> Result<(), HistoryError> {
        let turn = self.current_mut()?;
        let call = turn
            .tool_calls
            .iter_mut()
            .find(|c| c.call_id == call_id)
            .ok_or_else(|| HistoryError::UnknownToolCall(call_id.to_string()))?;
        if call.outcome.is_some() {
            return Err(HistoryError::AlreadyResolved(call_id.to_string()));
        }
        call.outcome = Some(outcome);
        Ok(())
    }

    pub fn set_assistant_text(&mut self, text: impl Into<String>) -> Result<(), HistoryError> {
        self.current_mut()?.assistant = Some(text.into());
        Ok(())
    }

    /// Record a call, run it through the router and attach its outcome
    pub async fn run_tool_call(
        &mut self,
        router: &ToolRouter,
        call_id: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<&ToolCallOutcome, HistoryError> {
        self.record_tool_call(call_id, tool_name, args.clone())?;
        let outcome = router.call(tool_name, Some(args)).await;
        self.attach_result(call_id, outcome)?;

        let turn = self.current_mut()?;
        turn.tool_calls
            .iter()
            .find(|c| c.call_id == call_id)
            .and_then(|c| c.outcome.as_ref())
            .ok_or_else(|| HistoryError::UnknownToolCall(call_id.to_string()))
    }

    /// The history as chat messages for the LLM, with row sets sampled.
    ///
    /// Unresolved tool calls are left out.
    pub fn to_context(&self) -> Vec<Value> {
        let mut messages = Vec::new();
        for turn in &self.turns {
            messages.push(json!({"role": "user", "content": turn.user}));

            let resolved: Vec<&ToolCallRecord> =
                turn.tool_calls.iter().filter(|c| c.outcome.is_some()).collect();
            if !resolved.is_empty() {
                let calls: Vec<Value> = resolved
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.call_id,
                            "type": "function",
                            "function": {"name": c.tool_name, "arguments": c.args.to_string()}
                        })
                    })
                    .collect();
                messages.push(json!({"role": "assistant", "tool_calls": calls}));

                for call in resolved {
                    if let Some(outcome) = &call.outcome {
                        messages.push(json!({
                            "role": "tool",
                            "tool_call_id": call.call_id,
                            "content": shape_for_context(&outcome.value).to_string(),
                        }));
                    }
                }
            }

            if let Some(text) = &turn.assistant {
                messages.push(json!({"role": "assistant", "content": text}));
            }
        }
        messages
    }
}

/// Replace a result's `rows` with a head+tail sample and report the true
/// `rowCount`. Values without a row array pass through unchanged.
pub fn shape_for_context(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };
    let Some(rows) = obj.get("rows").and_then(Value::as_array) else {
        return value.clone();
    };

    let sampled = sample_default(rows);
    let mut shaped = obj.clone();
    shaped.insert("rows".to_string(), Value::Array(sampled.rows));
    shaped.insert("rowCount".to_string(), json!(sampled.row_count));
    Value::Object(shaped)
}
