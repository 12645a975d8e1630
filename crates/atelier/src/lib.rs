//! Atelier: in-memory project engine for chat-driven code generation
//!
//! A model builds a small source project by issuing `str_replace_editor` and
//! `file_manager` tool calls. Atelier keeps the project as a path-keyed
//! [`FileTree`], applies streamed calls to it in order, and serializes it to a
//! [`Snapshot`] for every outbound request and for persistence.

mod clock;
mod config;

pub mod agent;
pub mod session;
pub mod vfs;

pub use agent::{ToolCallEvent, ToolCallInterpreter, ToolCallSequencer, ToolError, ToolResult};
pub use config::EngineConfig;
pub use session::{AnonWorkMirror, AuthFlow, ChatSession};
pub use vfs::{FileTree, FsError, Snapshot};
