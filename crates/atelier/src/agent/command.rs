//! Typed tool commands parsed from a call's JSON arguments.

use serde::{Deserialize, Serialize};

use super::interpreter::ToolError;

/// Name of the file editing tool.
pub const STR_REPLACE_EDITOR: &str = "str_replace_editor";
/// Name of the rename/delete tool.
pub const FILE_MANAGER: &str = "file_manager";

/// Commands accepted by `str_replace_editor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    /// Create or overwrite a file
    Create {
        /// Target file
        path: String,
        /// Full file content (empty when omitted)
        #[serde(default)]
        file_text: String,
    },
    /// Replace the single occurrence of `old_str`
    StrReplace {
        /// Target file
        path: String,
        /// Exact text to find
        old_str: String,
        /// Replacement text
        #[serde(default)]
        new_str: String,
    },
    /// Insert `new_str` as new line(s) before line `insert_line`
    Insert {
        /// Target file
        path: String,
        /// 0-based line index; 0 inserts before the first line
        insert_line: i64,
        /// Text to insert
        new_str: String,
    },
    /// Read a file or list a directory
    View {
        /// Target file or directory
        path: String,
        /// Optional 1-based inclusive `[start, end]`; `end = -1` reads to EOF
        #[serde(default)]
        view_range: Option<(i64, i64)>,
    },
    /// Revert the last edit (recognized but not supported)
    UndoEdit {
        /// Target file
        path: String,
    },
}

impl EditorCommand {
    /// The wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::StrReplace { .. } => "str_replace",
            Self::Insert { .. } => "insert",
            Self::View { .. } => "view",
            Self::UndoEdit { .. } => "undo_edit",
        }
    }

    /// The path this command targets.
    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. }
            | Self::StrReplace { path, .. }
            | Self::Insert { path, .. }
            | Self::View { path, .. }
            | Self::UndoEdit { path } => path,
        }
    }
}

/// Commands accepted by `file_manager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum FileManagerCommand {
    /// Move a file or directory
    Rename {
        /// Source path
        path: String,
        /// Destination path
        new_path: String,
    },
    /// Delete a file or directory
    Delete {
        /// Target path
        path: String,
    },
}

impl FileManagerCommand {
    /// The wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
        }
    }
}

/// A fully parsed call to one of the two tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    /// `str_replace_editor`
    Editor(EditorCommand),
    /// `file_manager`
    FileManager(FileManagerCommand),
}

impl ToolCommand {
    /// Parse a call's arguments for the named tool.
    pub fn parse(tool: &str, args: &serde_json::Value) -> Result<Self, ToolError> {
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: e.to_string(),
        };
        match tool {
            STR_REPLACE_EDITOR => serde_json::from_value(args.clone())
                .map(Self::Editor)
                .map_err(invalid),
            FILE_MANAGER => serde_json::from_value(args.clone())
                .map(Self::FileManager)
                .map_err(invalid),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// A display-oriented summary of this command.
    pub fn summary(&self) -> CommandSummary {
        match self {
            Self::Editor(cmd) => CommandSummary {
                tool: STR_REPLACE_EDITOR.to_string(),
                command: Some(cmd.name().to_string()),
                path: Some(cmd.path().to_string()),
                new_path: None,
            },
            Self::FileManager(FileManagerCommand::Rename { path, new_path }) => CommandSummary {
                tool: FILE_MANAGER.to_string(),
                command: Some("rename".to_string()),
                path: Some(path.clone()),
                new_path: Some(new_path.clone()),
            },
            Self::FileManager(FileManagerCommand::Delete { path }) => CommandSummary {
                tool: FILE_MANAGER.to_string(),
                command: Some("delete".to_string()),
                path: Some(path.clone()),
                new_path: None,
            },
        }
    }
}

/// Tool, command, and path(s) of a call: enough for a UI to describe it.
///
/// Built leniently from raw arguments so that even unparseable or failed
/// calls can be shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSummary {
    /// Tool name
    pub tool: String,
    /// Command name, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Primary path, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Rename destination, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
}

impl CommandSummary {
    /// Extract whatever fields are present in raw arguments.
    pub fn from_args(tool: &str, args: Option<&serde_json::Value>) -> Self {
        let field = |name: &str| {
            args.and_then(|a| a.get(name))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };
        Self {
            tool: tool.to_string(),
            command: field("command"),
            path: field("path"),
            new_path: field("new_path"),
        }
    }
}
