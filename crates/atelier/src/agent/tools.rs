//! Tool catalog offered to the model.
//!
//! [`builtin_tools`] describes `str_replace_editor` and `file_manager` as JSON
//! Schema. Front ends look tools up through a [`ToolRegistry`]; the CLI prints
//! its index and the MCP server lists and dispatches through it.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::command::{FILE_MANAGER, STR_REPLACE_EDITOR};

/// Name and one-line description, as shown in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    /// Tool name
    pub name: String,
    /// What the tool does
    pub description: String,
}

/// A tool and the JSON Schema of its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, as sent in `toolName`
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON Schema of the `args` object
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Describe a tool.
    ///
    /// ```rust
    /// use atelier::agent::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "snapshot",
    ///     "Return every file of the project",
    ///     json!({ "type": "object", "properties": {} }),
    /// );
    /// assert_eq!(tool.summary().name, "snapshot");
    /// ```
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Index entry for this tool.
    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// Lookup of the tools a front end offers.
pub trait ToolRegistry: Send + Sync {
    /// Index entries, in registration order.
    fn list_tools(&self) -> Vec<ToolSummary>;

    /// Full definition of one tool.
    fn get_tool(&self, name: &str) -> Option<ToolDefinition>;

    /// Whether a call to `name` can be dispatched.
    fn has_tool(&self, name: &str) -> bool {
        self.get_tool(name).is_some()
    }
}

/// Registry backed by a `Vec`, starting from the project tools.
#[derive(Debug, Default, Clone)]
pub struct VecToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl VecToolRegistry {
    /// Registry holding `str_replace_editor` and `file_manager`.
    pub fn builtin() -> Self {
        Self {
            tools: builtin_tools(),
        }
    }

    /// Register an extra tool after the built-in ones.
    pub fn add(&mut self, tool: ToolDefinition) {
        self.tools.push(tool);
    }

    /// All full definitions, in registration order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }
}

impl ToolRegistry for VecToolRegistry {
    fn list_tools(&self) -> Vec<ToolSummary> {
        self.tools.iter().map(ToolDefinition::summary).collect()
    }

    fn get_tool(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.iter().find(|t| t.name == name).cloned()
    }
}

/// Definitions of `str_replace_editor` and `file_manager`.
pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            STR_REPLACE_EDITOR,
            "Create, edit, insert into, or view files in the project",
            json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "enum": ["create", "str_replace", "insert", "view", "undo_edit"],
                        "description": "The operation to perform"
                    },
                    "path": {
                        "type": "string",
                        "description": "Absolute path of the file or directory, e.g. /App.jsx"
                    },
                    "file_text": {
                        "type": "string",
                        "description": "Full content for create"
                    },
                    "old_str": {
                        "type": "string",
                        "description": "Exact text to replace; must occur exactly once"
                    },
                    "new_str": {
                        "type": "string",
                        "description": "Replacement text for str_replace, or text for insert"
                    },
                    "insert_line": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Line index to insert before; 0 inserts at the top"
                    },
                    "view_range": {
                        "type": "array",
                        "items": { "type": "integer" },
                        "minItems": 2,
                        "maxItems": 2,
                        "description": "1-based inclusive [start, end]; end -1 reads to the end"
                    }
                },
                "required": ["command", "path"]
            }),
        ),
        ToolDefinition::new(
            FILE_MANAGER,
            "Rename or delete files and directories in the project",
            json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "enum": ["rename", "delete"],
                        "description": "The operation to perform"
                    },
                    "path": {
                        "type": "string",
                        "description": "Absolute path of the file or directory"
                    },
                    "new_path": {
                        "type": "string",
                        "description": "Destination path for rename"
                    }
                },
                "required": ["command", "path"]
            }),
        ),
    ]
}

/// Render a plain-text tool index.
///
/// Format: one tool per line, name and description separated by whitespace.
/// The name is left-padded to align descriptions.
///
/// ```text
/// str_replace_editor    Create, edit, insert into, or view files in the project
/// file_manager          Rename or delete files and directories in the project
/// ```
pub fn generate_index_txt(tools: &[ToolSummary]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    // Find max name length for alignment
    let max_name_len = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let padding = max_name_len + 4;

    let mut output = String::new();
    for tool in tools {
        let spaces = " ".repeat(padding - tool.name.len());
        output.push_str(&tool.name);
        output.push_str(&spaces);
        output.push_str(&tool.description);
        output.push('\n');
    }
    output
}
