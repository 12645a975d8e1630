//! Interpreter for `str_replace_editor` and `file_manager` calls.
//!
//! [`ToolCallInterpreter::apply`] takes one fully assembled call and the tree,
//! and either mutates the tree and returns a payload for the model, or returns
//! a [`ToolError`] having touched nothing. Every precondition is checked before
//! the single mutating step.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::command::{CommandSummary, EditorCommand, FileManagerCommand, ToolCommand};
use crate::config::{EngineConfig, truncate_output};
use crate::vfs::{FileTree, FsError, NodeKind, normalize_path};

/// A recoverable failure reported back to the model.
///
/// None of these abort a session: they become a [`ToolResult::Error`] so the
/// model can retry with corrected arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Path missing for view/str_replace/insert/delete/rename source
    #[error("file not found: {0}")]
    NotFound(String),
    /// Destination (or a colliding path) already exists
    #[error("path already exists: {0}")]
    Conflict(String),
    /// `old_str` does not occur in the file
    #[error("old_str was not found in {path}")]
    NoMatch {
        /// File that was searched
        path: String,
    },
    /// `old_str` occurs more than once
    #[error("old_str occurs {count} times in {path}")]
    AmbiguousMatch {
        /// File that was searched
        path: String,
        /// Number of occurrences, overlaps included
        count: usize,
    },
    /// A line index or range is outside the file
    #[error("line {line} is out of range for {path} ({line_count} lines)")]
    OutOfRange {
        /// Target file
        path: String,
        /// The offending line value
        line: i64,
        /// Number of lines in the file
        line_count: usize,
    },
    /// Malformed path
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// Arguments did not match the tool's schema
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments {
        /// Tool name
        tool: String,
        /// What was wrong
        message: String,
    },
    /// Tool name is not one this interpreter handles
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Command is recognized but not available
    #[error("{0} is not supported")]
    Unsupported(String),
}

impl ToolError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NoMatch { .. } => "no_match",
            Self::AmbiguousMatch { .. } => "ambiguous_match",
            Self::OutOfRange { .. } => "out_of_range",
            Self::InvalidPath(_) => "invalid_path",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::UnknownTool(_) => "unknown_tool",
            Self::Unsupported(_) => "unsupported",
        }
    }

    /// Corrective guidance for the model.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Check the path, or view the parent directory to see what exists.",
            Self::Conflict(_) => "Choose a destination that does not exist, or delete it first.",
            Self::NoMatch { .. } => {
                "The file content differs from what you expected. View the file and copy old_str exactly, including whitespace."
            }
            Self::AmbiguousMatch { .. } => {
                "Include more surrounding lines in old_str so that it matches exactly one location."
            }
            Self::OutOfRange { .. } => "View the file to check its line count and retry.",
            Self::InvalidPath(_) => "Use an absolute path such as /App.jsx.",
            Self::InvalidArguments { .. } => "Check the command name and required parameters.",
            Self::UnknownTool(_) => "Use str_replace_editor or file_manager.",
            Self::Unsupported(_) => "Use str_replace to revert changes instead.",
        }
    }
}

impl From<FsError> for ToolError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound(p) => Self::NotFound(p),
            FsError::Conflict(p) => Self::Conflict(p),
            FsError::NotADirectory(p) | FsError::InvalidPath(p) => Self::InvalidPath(p),
        }
    }
}

/// Result payload fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResult {
    /// Tool completed successfully with a JSON value.
    Success(serde_json::Value),
    /// Tool failed; the model is told why and how to recover.
    Error {
        /// The error message describing what went wrong.
        error: String,
        /// Stable error code.
        code: String,
        /// Corrective guidance.
        hint: String,
    },
}

impl ToolResult {
    /// Create a successful result.
    pub fn success(value: serde_json::Value) -> Self {
        Self::Success(value)
    }

    /// Check if this is a successful result.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&ToolError> for ToolResult {
    fn from(err: &ToolError) -> Self {
        Self::Error {
            error: err.to_string(),
            code: err.code().to_string(),
            hint: err.hint().to_string(),
        }
    }
}

/// A successfully applied call.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// What was run
    pub summary: CommandSummary,
    /// Payload returned to the model
    pub result: ToolResult,
    /// Whether the tree changed
    pub mutated: bool,
}

/// Applies parsed tool calls to a [`FileTree`].
#[derive(Debug, Clone, Default)]
pub struct ToolCallInterpreter {
    config: EngineConfig,
}

impl ToolCallInterpreter {
    /// Create an interpreter with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse and apply one call.
    pub fn apply(
        &self,
        tree: &mut FileTree,
        tool: &str,
        args: &serde_json::Value,
    ) -> Result<Applied, ToolError> {
        let command = ToolCommand::parse(tool, args)?;
        self.execute(tree, &command)
    }

    /// Apply an already parsed command.
    pub fn execute(&self, tree: &mut FileTree, command: &ToolCommand) -> Result<Applied, ToolError> {
        let summary = command.summary();
        let (value, mutated) = match command {
            ToolCommand::Editor(cmd) => self.run_editor(tree, cmd)?,
            ToolCommand::FileManager(cmd) => run_file_manager(tree, cmd)?,
        };
        tracing::debug!(
            tool = %summary.tool,
            command = ?summary.command,
            path = ?summary.path,
            mutated,
            "applied tool call"
        );
        Ok(Applied {
            summary,
            result: ToolResult::success(value),
            mutated,
        })
    }

    fn run_editor(
        &self,
        tree: &mut FileTree,
        cmd: &EditorCommand,
    ) -> Result<(serde_json::Value, bool), ToolError> {
        match cmd {
            EditorCommand::Create { path, file_text } => {
                let path = normalize_path(path)?;
                tree.set(&path, file_text.as_str())?;
                Ok((json!(format!("File created: {path}")), true))
            }
            EditorCommand::StrReplace {
                path,
                old_str,
                new_str,
            } => {
                let path = normalize_path(path)?;
                let updated = replace_unique(&path, tree.get(&path)?, old_str, new_str)?;
                tree.set(&path, updated)?;
                Ok((json!(format!("Replaced 1 occurrence in {path}")), true))
            }
            EditorCommand::Insert {
                path,
                insert_line,
                new_str,
            } => {
                let path = normalize_path(path)?;
                let updated = insert_at(&path, tree.get(&path)?, *insert_line, new_str)?;
                tree.set(&path, updated)?;
                Ok((
                    json!(format!("Text inserted at line {insert_line} in {path}")),
                    true,
                ))
            }
            EditorCommand::View { path, view_range } => {
                let text = self.view(tree, path, *view_range)?;
                Ok((json!(text), false))
            }
            EditorCommand::UndoEdit { .. } => Err(ToolError::Unsupported("undo_edit".to_string())),
        }
    }

    fn view(
        &self,
        tree: &FileTree,
        path: &str,
        view_range: Option<(i64, i64)>,
    ) -> Result<String, ToolError> {
        let path = normalize_path(path)?;
        let node = tree
            .node(&path)
            .ok_or_else(|| ToolError::NotFound(path.clone()))?;

        if node.kind == NodeKind::Directory {
            let entries = tree.list(&path)?;
            if entries.is_empty() {
                return Ok("(empty directory)".to_string());
            }
            let listing = entries
                .iter()
                .map(|e| match e.kind {
                    NodeKind::Directory => format!("[DIR] {}", e.name),
                    NodeKind::File => format!("[FILE] {}", e.name),
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(listing);
        }

        let content = node.content.unwrap_or_default();
        let (first_line, selected) = select_lines(&path, content, view_range)?;
        let text = if self.config.number_view_lines {
            selected
                .iter()
                .enumerate()
                .map(|(i, line)| format!("{}\t{line}", first_line + i))
                .collect::<Vec<_>>()
                .join("\n")
        } else if view_range.is_none() {
            content.to_string()
        } else {
            selected.join("\n")
        };

        let (text, truncated) = truncate_output(text, self.config.max_view_bytes);
        if truncated {
            tracing::debug!(path = %path, "view output truncated");
        }
        Ok(text)
    }
}

fn run_file_manager(
    tree: &mut FileTree,
    cmd: &FileManagerCommand,
) -> Result<(serde_json::Value, bool), ToolError> {
    match cmd {
        FileManagerCommand::Rename { path, new_path } => {
            let renamed = tree.rename(path, new_path)?;
            let (from, to) = (normalize_path(path)?, normalize_path(new_path)?);
            Ok((
                json!({
                    "success": true,
                    "message": format!("Successfully renamed {from} to {to}"),
                    "moved": renamed.moves.len(),
                }),
                true,
            ))
        }
        FileManagerCommand::Delete { path } => {
            let removed = tree.remove(path)?;
            let path = normalize_path(path)?;
            Ok((
                json!({
                    "success": true,
                    "message": format!("Successfully deleted {path}"),
                    "removed": removed.paths,
                }),
                true,
            ))
        }
    }
}

/// Count occurrences of `needle`, overlapping ones included.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    let mut count = 0;
    let mut start = 0;
    while let Some(idx) = haystack[start..].find(needle) {
        count += 1;
        let at = start + idx;
        // Advance one char past the match start
        start = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
        if start > haystack.len() {
            break;
        }
    }
    count
}

fn replace_unique(
    path: &str,
    content: &str,
    old_str: &str,
    new_str: &str,
) -> Result<String, ToolError> {
    if old_str.is_empty() {
        return Err(ToolError::InvalidArguments {
            tool: super::command::STR_REPLACE_EDITOR.to_string(),
            message: "old_str must not be empty".to_string(),
        });
    }
    match count_occurrences(content, old_str) {
        0 => Err(ToolError::NoMatch {
            path: path.to_string(),
        }),
        1 => Ok(content.replacen(old_str, new_str, 1)),
        count => Err(ToolError::AmbiguousMatch {
            path: path.to_string(),
            count,
        }),
    }
}

/// Split content into lines, remembering whether it ended with a newline.
fn split_lines(content: &str) -> (Vec<&str>, bool) {
    if content.is_empty() {
        return (Vec::new(), false);
    }
    match content.strip_suffix('\n') {
        Some(body) => (body.split('\n').collect(), true),
        None => (content.split('\n').collect(), false),
    }
}

fn insert_at(path: &str, content: &str, line: i64, new_str: &str) -> Result<String, ToolError> {
    let (mut lines, trailing_newline) = split_lines(content);
    let line_count = lines.len();
    let index = usize::try_from(line)
        .ok()
        .filter(|&i| i <= line_count)
        .ok_or_else(|| ToolError::OutOfRange {
            path: path.to_string(),
            line,
            line_count,
        })?;

    lines.insert(index, new_str);
    let mut updated = lines.join("\n");
    if trailing_newline {
        updated.push('\n');
    }
    Ok(updated)
}

/// Resolve a 1-based inclusive view range to `(first_line_number, lines)`.
fn select_lines<'a>(
    path: &str,
    content: &'a str,
    view_range: Option<(i64, i64)>,
) -> Result<(usize, Vec<&'a str>), ToolError> {
    let (lines, _) = split_lines(content);
    let line_count = lines.len();
    let Some((start, end)) = view_range else {
        return Ok((1, lines));
    };

    let out_of_range = |line: i64| ToolError::OutOfRange {
        path: path.to_string(),
        line,
        line_count,
    };
    // An empty file still has line 1 to view.
    let last_line = line_count.max(1);
    let first = usize::try_from(start)
        .ok()
        .filter(|&s| s >= 1 && s <= last_line)
        .ok_or_else(|| out_of_range(start))?;
    let last = if end == -1 {
        line_count
    } else {
        usize::try_from(end)
            .ok()
            .filter(|&e| e >= first && e <= last_line)
            .ok_or_else(|| out_of_range(end))?
    };

    let selected = lines
        .get(first - 1..last)
        .map(<[&str]>::to_vec)
        .unwrap_or_default();
    Ok((first, selected))
}
