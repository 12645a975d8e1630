//! Integration tests for the Atelier MCP server.
//!
//! These tests spawn the actual MCP server binary and communicate with it
//! over stdio using JSON-RPC.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

/// Helper to spawn the MCP server process
struct McpServerProcess {
    child: Child,
    next_id: u64,
}

impl McpServerProcess {
    fn spawn() -> Self {
        Self::spawn_with_args(&[])
    }

    fn spawn_with_args(args: &[&str]) -> Self {
        let binary = env!("CARGO_BIN_EXE_atelier-mcp");

        let child = Command::new(binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap_or_else(|e| panic!("Failed to spawn MCP server at {:?}: {}", binary, e));

        Self { child, next_id: 1 }
    }

    /// Send a JSON-RPC request and get the response
    fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;

        let stdin = self.child.stdin.as_mut().expect("stdin not captured");
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let request_str = serde_json::to_string(&request).expect("serialize request");
        writeln!(stdin, "{}", request_str).expect("write request");
        stdin.flush().expect("flush stdin");

        let stdout = self.child.stdout.as_mut().expect("stdout not captured");
        let mut reader = BufReader::new(stdout);
        let mut response_line = String::new();
        reader.read_line(&mut response_line).expect("read response");

        let response: Value = serde_json::from_str(&response_line)
            .unwrap_or_else(|e| panic!("parse response '{}': {}", response_line.trim(), e));
        assert_eq!(response["id"], id);
        response
    }

    /// Send a notification (no response expected)
    fn notify(&mut self, notification: Value) {
        let stdin = self.child.stdin.as_mut().expect("stdin not captured");
        let notification_str =
            serde_json::to_string(&notification).expect("serialize notification");
        writeln!(stdin, "{}", notification_str).expect("write notification");
        stdin.flush().expect("flush stdin");
    }

    /// Call a tool and return `(text, is_error)`
    fn call_tool(&mut self, name: &str, arguments: Value) -> (String, bool) {
        let response = self.request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        );
        let result = &response["result"];
        assert!(
            !result.is_null(),
            "Expected result, got: {}",
            response
        );
        let text = result["content"][0]["text"]
            .as_str()
            .expect("text content")
            .to_string();
        (text, result["isError"].as_bool().unwrap_or(false))
    }
}

impl Drop for McpServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Perform MCP initialization handshake
fn initialize(server: &mut McpServerProcess) -> Value {
    let init_response = server.request(
        "initialize",
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "atelier-mcp-test",
                "version": "0.1.0"
            }
        }),
    );

    assert_eq!(init_response["jsonrpc"], "2.0");
    assert!(
        init_response.get("result").is_some(),
        "Expected result in initialize response, got: {}",
        init_response
    );

    server.notify(json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }));

    // Give the server a moment to process
    std::thread::sleep(Duration::from_millis(50));

    init_response
}

#[test]
fn test_mcp_initialize() {
    let mut server = McpServerProcess::spawn();
    let response = initialize(&mut server);

    let result = &response["result"];
    assert!(result.get("serverInfo").is_some(), "Expected serverInfo in result");
    assert!(
        result["capabilities"].get("tools").is_some(),
        "Expected tools capability"
    );
}

#[test]
fn test_mcp_list_tools() {
    let mut server = McpServerProcess::spawn();
    initialize(&mut server);

    let response = server.request("tools/list", json!({}));
    let tools = response["result"]["tools"]
        .as_array()
        .expect("tools should be an array");

    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, ["str_replace_editor", "file_manager", "snapshot"]);
    for tool in tools {
        assert!(tool.get("description").is_some(), "Tool should have description");
        assert!(tool.get("inputSchema").is_some(), "Tool should have inputSchema");
    }
}

#[test]
fn test_mcp_create_replace_view() {
    let mut server = McpServerProcess::spawn();
    initialize(&mut server);

    let (text, is_error) = server.call_tool(
        "str_replace_editor",
        json!({"command": "create", "path": "/App.jsx", "file_text": "a"}),
    );
    assert!(!is_error);
    assert_eq!(text, "File created: /App.jsx");

    let (_, is_error) = server.call_tool(
        "str_replace_editor",
        json!({"command": "str_replace", "path": "/App.jsx", "old_str": "a", "new_str": "b"}),
    );
    assert!(!is_error);

    let (text, _) = server.call_tool(
        "str_replace_editor",
        json!({"command": "view", "path": "/App.jsx"}),
    );
    assert_eq!(text, "b");
}

#[test]
fn test_mcp_tool_error_is_not_fatal() {
    let mut server = McpServerProcess::spawn();
    initialize(&mut server);

    let (text, is_error) = server.call_tool(
        "file_manager",
        json!({"command": "delete", "path": "/missing.js"}),
    );
    assert!(is_error);
    let payload: Value = serde_json::from_str(&text).expect("error payload");
    assert_eq!(payload["code"], "not_found");

    // The server keeps working
    let (_, is_error) = server.call_tool(
        "str_replace_editor",
        json!({"command": "create", "path": "/ok.js"}),
    );
    assert!(!is_error);
}

#[test]
fn test_mcp_unknown_tool() {
    let mut server = McpServerProcess::spawn();
    initialize(&mut server);

    let response = server.request(
        "tools/call",
        json!({ "name": "execute", "arguments": {} }),
    );
    assert!(
        response.get("error").is_some(),
        "Expected error for unknown tool, got: {}",
        response
    );
}

#[test]
fn test_mcp_seeded_from_snapshot() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("snapshot.json");
    fs::write(
        &path,
        r#"{"/src/App.jsx": "one\ntwo\nthree", "/src/index.js": "import App"}"#,
    )
    .expect("write snapshot");

    let path_str = path.to_str().expect("utf-8 path");
    let mut server = McpServerProcess::spawn_with_args(&["--snapshot", path_str, "--number-lines"]);
    initialize(&mut server);

    let (text, _) = server.call_tool(
        "str_replace_editor",
        json!({"command": "view", "path": "/src/App.jsx", "view_range": [2, -1]}),
    );
    assert_eq!(text, "2\ttwo\n3\tthree");

    let (text, _) = server.call_tool(
        "file_manager",
        json!({"command": "rename", "path": "/src", "new_path": "/lib"}),
    );
    let payload: Value = serde_json::from_str(&text).expect("rename payload");
    assert_eq!(payload["success"], true);

    let (text, _) = server.call_tool("snapshot", json!({}));
    let snapshot: Value = serde_json::from_str(&text).expect("snapshot json");
    assert_eq!(snapshot["/lib/index.js"], "import App");
    assert!(snapshot.get("/src/App.jsx").is_none());

    // The file on disk is never touched
    let on_disk = fs::read_to_string(&path).expect("read snapshot");
    assert!(on_disk.contains("/src/App.jsx"));
}
