//! Assembly and ordered application of streamed tool calls.
//!
//! The chat transport delivers each call as a `tool-call-streaming-start`, any
//! number of `tool-call-delta` fragments, and a final `tool-call`. Every call
//! id moves through `partial-call -> call -> result | error` and never back.
//! Only the final event applies anything, so a truncated stream leaves its
//! call in `partial-call` forever without touching the tree.

use std::collections::HashMap;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::command::CommandSummary;
use super::display::CallStatus;
use super::interpreter::{ToolCallInterpreter, ToolError, ToolResult};
use crate::config::EngineConfig;
use crate::vfs::FileTree;

/// One event of the tool-call stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ToolCallEvent {
    /// A new call begins streaming.
    #[serde(rename_all = "camelCase")]
    ToolCallStreamingStart {
        /// Call id
        tool_call_id: String,
        /// Tool name
        tool_name: String,
    },
    /// More argument text for a started call.
    #[serde(rename_all = "camelCase")]
    ToolCallDelta {
        /// Call id
        tool_call_id: String,
        /// JSON text fragment
        args_text_delta: String,
    },
    /// The call is complete.
    #[serde(rename_all = "camelCase")]
    ToolCall {
        /// Call id
        tool_call_id: String,
        /// Tool name
        tool_name: String,
        /// Parsed arguments; when absent the accumulated deltas are parsed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<serde_json::Value>,
    },
}

impl ToolCallEvent {
    /// The call id this event belongs to.
    pub fn tool_call_id(&self) -> &str {
        match self {
            Self::ToolCallStreamingStart { tool_call_id, .. }
            | Self::ToolCallDelta { tool_call_id, .. }
            | Self::ToolCall { tool_call_id, .. } => tool_call_id,
        }
    }

    /// Parse one JSON line.
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Lifecycle of a single call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallState {
    /// Arguments are still arriving
    PartialCall {
        /// Concatenated argument fragments so far
        args_text: String,
    },
    /// Arguments are complete and the call is being applied
    Call {
        /// Final arguments
        args: serde_json::Value,
    },
    /// Applied successfully
    Result {
        /// Final arguments
        args: serde_json::Value,
        /// Payload returned to the model
        result: ToolResult,
    },
    /// Rejected; the tree was not touched
    Error {
        /// Final arguments, when they parsed
        args: Option<serde_json::Value>,
        /// Why it failed
        error: ToolError,
    },
}

impl CallState {
    /// Wire name of the state.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PartialCall { .. } => "partial-call",
            Self::Call { .. } => "call",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }

    /// True once the call reached `result` or `error`.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }

    fn args(&self) -> Option<&serde_json::Value> {
        match self {
            Self::PartialCall { .. } => None,
            Self::Call { args } | Self::Result { args, .. } => Some(args),
            Self::Error { args, .. } => args.as_ref(),
        }
    }
}

/// A call and its current state.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    /// Call id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Current state
    pub state: CallState,
}

impl ToolCallRecord {
    /// Arguments, once known. Partial argument text is parsed when it already
    /// forms complete JSON.
    pub fn args(&self) -> Option<serde_json::Value> {
        match &self.state {
            CallState::PartialCall { args_text } => serde_json::from_str(args_text).ok(),
            state => state.args().cloned(),
        }
    }

    /// Tool, command and paths, as far as they are known.
    pub fn summary(&self) -> CommandSummary {
        CommandSummary::from_args(&self.name, self.args().as_ref())
    }

    /// Display text and loading flag.
    pub fn status(&self) -> CallStatus {
        self.to_invocation().status()
    }

    /// Convert into the form attached to chat messages.
    ///
    /// Errors are reported as results carrying the error payload, since that is
    /// what the model sees.
    pub fn to_invocation(&self) -> ToolInvocation {
        let (state, result) = match &self.state {
            CallState::PartialCall { .. } => (InvocationState::PartialCall, None),
            CallState::Call { .. } => (InvocationState::Call, None),
            CallState::Result { result, .. } => (InvocationState::Result, Some(result.clone())),
            CallState::Error { error, .. } => {
                (InvocationState::Result, Some(ToolResult::from(error)))
            }
        };
        ToolInvocation {
            state,
            tool_call_id: self.id.clone(),
            tool_name: self.name.clone(),
            args: self.args().unwrap_or(serde_json::Value::Null),
            result,
        }
    }
}

/// State of an invocation as attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationState {
    /// Arguments still streaming
    PartialCall,
    /// Arguments complete
    Call,
    /// Settled
    Result,
}

/// A tool call attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    /// Lifecycle state
    pub state: InvocationState,
    /// Call id
    pub tool_call_id: String,
    /// Tool name
    pub tool_name: String,
    /// Arguments (`null` while unknown)
    #[serde(default)]
    pub args: serde_json::Value,
    /// Result payload once settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

impl ToolInvocation {
    /// Display text and loading flag.
    pub fn status(&self) -> CallStatus {
        CallStatus::for_invocation(self)
    }
}

/// Stream protocol violations. The tree is never touched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Delta for a call that never started
    #[error("unknown tool call id: {0}")]
    UnknownCall(String),
    /// Second start for the same id
    #[error("tool call {0} already started")]
    DuplicateStart(String),
    /// Event for a call that already reached result/error
    #[error("tool call {0} is already settled")]
    AlreadySettled(String),
    /// Final event names a different tool than the start did
    #[error("tool call {id} started as {expected} but completed as {found}")]
    NameMismatch {
        /// Call id
        id: String,
        /// Name from the start event
        expected: String,
        /// Name from the final event
        found: String,
    },
}

/// What a single event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A call started or received more argument text
    Accumulated,
    /// A call was applied
    Applied {
        /// Call id
        id: String,
        /// Whether the tree changed
        mutated: bool,
    },
    /// A call settled in `error`
    Failed {
        /// Call id
        id: String,
        /// Why
        error: ToolError,
    },
}

impl Step {
    /// True when the tree changed.
    pub fn mutated(&self) -> bool {
        matches!(self, Self::Applied { mutated: true, .. })
    }
}

/// Applies tool-call events to a [`FileTree`] in arrival order.
#[derive(Debug, Default)]
pub struct ToolCallSequencer {
    interpreter: ToolCallInterpreter,
    calls: Vec<ToolCallRecord>,
    index: HashMap<String, usize>,
}

impl ToolCallSequencer {
    /// Create a sequencer with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            interpreter: ToolCallInterpreter::new(config),
            calls: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Handle one event.
    pub fn handle(&mut self, tree: &mut FileTree, event: ToolCallEvent) -> Result<Step, SequenceError> {
        match event {
            ToolCallEvent::ToolCallStreamingStart {
                tool_call_id,
                tool_name,
            } => {
                if let Some(record) = self.get(&tool_call_id) {
                    return Err(if record.state.is_settled() {
                        SequenceError::AlreadySettled(tool_call_id)
                    } else {
                        SequenceError::DuplicateStart(tool_call_id)
                    });
                }
                tracing::debug!(id = %tool_call_id, tool = %tool_name, "tool call started");
                self.insert(ToolCallRecord {
                    id: tool_call_id,
                    name: tool_name,
                    state: CallState::PartialCall {
                        args_text: String::new(),
                    },
                });
                Ok(Step::Accumulated)
            }
            ToolCallEvent::ToolCallDelta {
                tool_call_id,
                args_text_delta,
            } => {
                let record = self
                    .get_mut(&tool_call_id)
                    .ok_or_else(|| SequenceError::UnknownCall(tool_call_id.clone()))?;
                match &mut record.state {
                    CallState::PartialCall { args_text } => {
                        args_text.push_str(&args_text_delta);
                        Ok(Step::Accumulated)
                    }
                    _ => Err(SequenceError::AlreadySettled(tool_call_id)),
                }
            }
            ToolCallEvent::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => self.complete(tree, tool_call_id, tool_name, args),
        }
    }

    /// Handle every event of a stream in order, stopping at the first
    /// protocol violation. Returns the number of calls that changed the tree.
    pub async fn apply_stream<S>(&mut self, tree: &mut FileTree, events: S) -> Result<usize, SequenceError>
    where
        S: Stream<Item = ToolCallEvent>,
    {
        let mut events = std::pin::pin!(events);
        let mut mutations = 0;
        while let Some(event) = events.next().await {
            if self.handle(tree, event)?.mutated() {
                mutations += 1;
            }
        }
        Ok(mutations)
    }

    /// All calls seen so far, in arrival order.
    pub fn records(&self) -> &[ToolCallRecord] {
        &self.calls
    }

    /// Look up one call.
    pub fn get(&self, id: &str) -> Option<&ToolCallRecord> {
        self.index.get(id).and_then(|&i| self.calls.get(i))
    }

    /// Display status for one call.
    pub fn status(&self, id: &str) -> Option<CallStatus> {
        self.get(id).map(ToolCallRecord::status)
    }

    /// Message-attachable form of every call.
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        self.calls.iter().map(ToolCallRecord::to_invocation).collect()
    }

    /// Number of calls not yet settled.
    pub fn pending(&self) -> usize {
        self.calls.iter().filter(|c| !c.state.is_settled()).count()
    }

    /// Forget all records. Call ids may be reused afterwards.
    pub fn reset(&mut self) {
        self.calls.clear();
        self.index.clear();
    }

    fn complete(
        &mut self,
        tree: &mut FileTree,
        id: String,
        name: String,
        args: Option<serde_json::Value>,
    ) -> Result<Step, SequenceError> {
        let streamed_text = match self.get(&id) {
            Some(record) => {
                if record.state.is_settled() {
                    return Err(SequenceError::AlreadySettled(id));
                }
                if record.name != name {
                    return Err(SequenceError::NameMismatch {
                        expected: record.name.clone(),
                        found: name,
                        id,
                    });
                }
                match &record.state {
                    CallState::PartialCall { args_text } => Some(args_text.clone()),
                    _ => None,
                }
            }
            None => {
                self.insert(ToolCallRecord {
                    id: id.clone(),
                    name: name.clone(),
                    state: CallState::PartialCall {
                        args_text: String::new(),
                    },
                });
                None
            }
        };

        let args = match args {
            Some(args) => Ok(args),
            None => parse_args_text(&name, streamed_text.as_deref().unwrap_or_default()),
        };
        let args = match args {
            Ok(args) => args,
            Err(error) => return Ok(self.settle_error(id, None, error)),
        };

        self.set_state(&id, CallState::Call { args: args.clone() });
        tracing::debug!(id = %id, tool = %name, "tool call complete");

        match self.interpreter.apply(tree, &name, &args) {
            Ok(applied) => {
                self.set_state(
                    &id,
                    CallState::Result {
                        args,
                        result: applied.result,
                    },
                );
                Ok(Step::Applied {
                    id,
                    mutated: applied.mutated,
                })
            }
            Err(error) => Ok(self.settle_error(id, Some(args), error)),
        }
    }

    fn settle_error(&mut self, id: String, args: Option<serde_json::Value>, error: ToolError) -> Step {
        tracing::warn!(id = %id, code = error.code(), error = %error, "tool call failed");
        self.set_state(
            &id,
            CallState::Error {
                args,
                error: error.clone(),
            },
        );
        Step::Failed { id, error }
    }

    fn insert(&mut self, record: ToolCallRecord) {
        self.index.insert(record.id.clone(), self.calls.len());
        self.calls.push(record);
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ToolCallRecord> {
        let i = *self.index.get(id)?;
        self.calls.get_mut(i)
    }

    fn set_state(&mut self, id: &str, state: CallState) {
        if let Some(record) = self.get_mut(id) {
            record.state = state;
        }
    }
}

fn parse_args_text(tool: &str, text: &str) -> Result<serde_json::Value, ToolError> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(text).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: format!("arguments are not valid JSON: {e}"),
    })
}
