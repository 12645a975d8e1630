//! Human-readable progress text for tool calls.

use serde::Serialize;

use super::command::{FILE_MANAGER, STR_REPLACE_EDITOR};
use super::sequencer::{InvocationState, ToolInvocation};

/// Which glyph a UI should show once a call is no longer loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusIcon {
    /// New file
    FilePlus,
    /// Edited file (also the fallback)
    FileEdit,
    /// Read-only access
    Eye,
    /// Deletion
    Trash,
    /// Rename or move
    FolderEdit,
}

/// What to show for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallStatus {
    /// e.g. `Creating App.jsx`
    pub text: String,
    /// Icon for the settled state
    pub icon: StatusIcon,
    /// Whether a spinner should be shown
    pub loading: bool,
}

impl CallStatus {
    /// Describe a call from its tool name, raw arguments and state.
    pub fn describe(tool: &str, args: Option<&serde_json::Value>, state: InvocationState) -> Self {
        let (text, icon) = describe_text(tool, args);
        Self {
            text,
            icon,
            loading: matches!(state, InvocationState::PartialCall | InvocationState::Call),
        }
    }

    /// Describe a message-attached invocation.
    pub fn for_invocation(invocation: &ToolInvocation) -> Self {
        let args = (!invocation.args.is_null()).then_some(&invocation.args);
        Self::describe(&invocation.tool_name, args, invocation.state)
    }
}

fn describe_text(tool: &str, args: Option<&serde_json::Value>) -> (String, StatusIcon) {
    let Some(args) = args else {
        return (tool.to_string(), StatusIcon::FileEdit);
    };
    let field = |name: &str| args.get(name).and_then(serde_json::Value::as_str);
    let file_name = field("path").map_or("file", last_segment);
    let command = field("command").unwrap_or_default();

    match tool {
        STR_REPLACE_EDITOR => match command {
            "create" => (format!("Creating {file_name}"), StatusIcon::FilePlus),
            "str_replace" => (format!("Editing {file_name}"), StatusIcon::FileEdit),
            "insert" => (format!("Adding code to {file_name}"), StatusIcon::FileEdit),
            "view" => (format!("Reading {file_name}"), StatusIcon::Eye),
            _ => (format!("Modifying {file_name}"), StatusIcon::FileEdit),
        },
        FILE_MANAGER => match command {
            "rename" => {
                let new_name = field("new_path")
                    .filter(|p| !p.is_empty())
                    .map_or("", last_segment);
                (
                    format!("Renaming {file_name} to {new_name}"),
                    StatusIcon::FolderEdit,
                )
            }
            "delete" => (format!("Deleting {file_name}"), StatusIcon::Trash),
            _ => (format!("Managing {file_name}"), StatusIcon::FileEdit),
        },
        other => (other.to_string(), StatusIcon::FileEdit),
    }
}

fn last_segment(path: &str) -> &str {
    if path.is_empty() {
        return "file";
    }
    path.rsplit('/').next().unwrap_or(path)
}
