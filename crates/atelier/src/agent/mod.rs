//! Tool-call engine.
//!
//! The model edits the project only through two tools. Calls arrive as a
//! stream of fragments, are assembled per call id, and are applied to the
//! session's [`FileTree`](crate::vfs::FileTree) strictly in completion order.
//!
//! ```text
//! ToolCallEvent stream
//!   -> ToolCallSequencer   (partial-call -> call -> result | error)
//!   -> ToolCallInterpreter (typed command, preconditions, one mutation)
//!   -> FileTree
//! ```
//!
//! # Example
//!
//! ```rust
//! use atelier::agent::{ToolCallEvent, ToolCallSequencer};
//! use atelier::vfs::FileTree;
//! use serde_json::json;
//!
//! let mut tree = FileTree::new();
//! let mut sequencer = ToolCallSequencer::default();
//!
//! let step = sequencer.handle(
//!     &mut tree,
//!     ToolCallEvent::ToolCall {
//!         tool_call_id: "call_1".into(),
//!         tool_name: "str_replace_editor".into(),
//!         args: Some(json!({"command": "create", "path": "/App.jsx", "file_text": "a"})),
//!     },
//! )?;
//!
//! assert!(step.mutated());
//! assert_eq!(tree.get("/App.jsx")?, "a");
//! assert_eq!(sequencer.status("call_1").map(|s| s.text), Some("Creating App.jsx".to_string()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod command;
mod display;
mod interpreter;
mod sequencer;
mod tools;

pub use command::{
    CommandSummary, EditorCommand, FILE_MANAGER, FileManagerCommand, STR_REPLACE_EDITOR,
    ToolCommand,
};
pub use display::{CallStatus, StatusIcon};
pub use interpreter::{Applied, ToolCallInterpreter, ToolError, ToolResult};
pub use sequencer::{
    CallState, InvocationState, SequenceError, Step, ToolCallEvent, ToolCallRecord,
    ToolCallSequencer, ToolInvocation,
};
pub use tools::{
    ToolDefinition, ToolRegistry, ToolSummary, VecToolRegistry, builtin_tools, generate_index_txt,
};
