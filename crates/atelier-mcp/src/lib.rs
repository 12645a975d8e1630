//! Atelier MCP Server
//!
//! An MCP server that exposes one in-memory project to an agent through the
//! `str_replace_editor` and `file_manager` tools, plus a `snapshot` tool that
//! returns every file. Nothing is ever written to disk.

use std::sync::Arc;

use atelier::agent::{
    ToolCallInterpreter, ToolDefinition, ToolRegistry, ToolResult, VecToolRegistry,
};
use atelier::{EngineConfig, FileTree, Snapshot};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Name of the read-only tool returning the whole project.
pub const SNAPSHOT_TOOL: &str = "snapshot";

/// Parameters for the `snapshot` tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotParams {
    /// Pretty-print the JSON document
    #[serde(default)]
    pub pretty: bool,
}

/// MCP Server that owns one project tree
#[derive(Clone)]
pub struct ProjectServer {
    interpreter: Arc<ToolCallInterpreter>,
    registry: Arc<VecToolRegistry>,
    tree: Arc<Mutex<FileTree>>,
}

impl std::fmt::Debug for ProjectServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectServer").finish_non_exhaustive()
    }
}

impl ProjectServer {
    /// Create a server with an empty project.
    pub fn new(config: EngineConfig) -> Self {
        let mut registry = VecToolRegistry::builtin();
        registry.add(ToolDefinition::new(
            SNAPSHOT_TOOL,
            "Return every file of the project as a JSON object mapping path to content",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "pretty": { "type": "boolean", "description": "Pretty-print the JSON" }
                }
            }),
        ));
        Self {
            interpreter: Arc::new(ToolCallInterpreter::new(config)),
            registry: Arc::new(registry),
            tree: Arc::new(Mutex::new(FileTree::new())),
        }
    }

    /// Create a server whose project starts from a snapshot.
    pub fn from_snapshot(config: EngineConfig, snapshot: &Snapshot) -> Result<Self, atelier::FsError> {
        let server = Self::new(config);
        let tree = FileTree::from_snapshot(snapshot)?;
        Ok(Self {
            tree: Arc::new(Mutex::new(tree)),
            ..server
        })
    }

    /// Apply one editing call to the project.
    async fn apply(&self, name: &str, args: serde_json::Value) -> Result<CallToolResult, McpError> {
        let mut tree = self.tree.lock().await;
        match self.interpreter.apply(&mut tree, name, &args) {
            Ok(applied) => {
                tracing::info!(
                    tool = name,
                    command = ?applied.summary.command,
                    path = ?applied.summary.path,
                    "tool call applied"
                );
                Ok(CallToolResult::success(vec![Content::text(render(
                    &applied.result,
                ))]))
            }
            Err(error) => {
                tracing::warn!(tool = name, code = error.code(), %error, "tool call rejected");
                Ok(CallToolResult::error(vec![Content::text(render(
                    &ToolResult::from(&error),
                ))]))
            }
        }
    }

    async fn snapshot(&self, params: SnapshotParams) -> Result<CallToolResult, McpError> {
        let snapshot = self.tree.lock().await.serialize();
        let json = if params.pretty {
            snapshot.to_json_pretty()
        } else {
            snapshot.to_json()
        }
        .map_err(|e| McpError::internal_error(format!("Snapshot error: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    fn tools(&self) -> Vec<Tool> {
        self.registry
            .definitions()
            .iter()
            .cloned()
            .map(to_mcp_tool)
            .collect()
    }
}

/// Text shown to the client: plain strings as-is, anything else as JSON.
fn render(result: &ToolResult) -> String {
    match result {
        ToolResult::Success(serde_json::Value::String(text)) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn to_mcp_tool(definition: ToolDefinition) -> Tool {
    let input_schema = match definition.parameters {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    };

    Tool {
        name: definition.name.into(),
        title: None,
        description: Some(definition.description.into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

impl ServerHandler for ProjectServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Atelier holds a small in-memory source project. Use 'str_replace_editor' to \
                create, view, insert into, and edit files, 'file_manager' to rename or delete \
                them, and 'snapshot' to read the whole project. str_replace requires old_str to \
                match exactly once."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if !self.registry.has_tool(&request.name) {
            return Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ));
        }

        let args = serde_json::Value::Object(request.arguments.clone().unwrap_or_default());
        if request.name == SNAPSHOT_TOOL {
            let params: SnapshotParams = serde_json::from_value(args).map_err(|e| {
                McpError::invalid_params(format!("Invalid parameters: {}", e), None)
            })?;
            return self.snapshot(params).await;
        }
        self.apply(&request.name, args).await
    }
}
