//! Integration tests for chat sessions.
//!
//! These tests drive the public API end to end:
//! - Streamed tool calls building and editing a project
//! - Snapshot hand-off between sessions
//! - Sign-in landing and anonymous work migration

use std::sync::Arc;

use async_trait::async_trait;
use atelier::agent::{InvocationState, Step, ToolCallEvent, ToolError};
use atelier::session::{
    AnonWorkMirror, AnonWorkStore, AuthBackend, AuthFlow, AuthResult, ChatSession,
    InMemoryAnonWorkStore, InMemoryProjectStore, NewProject, ProjectStore, ServiceError,
};
use atelier::{EngineConfig, FileTree, Snapshot};
use serde_json::json;

fn start(id: &str, tool: &str) -> ToolCallEvent {
    ToolCallEvent::ToolCallStreamingStart {
        tool_call_id: id.to_string(),
        tool_name: tool.to_string(),
    }
}

fn delta(id: &str, text: &str) -> ToolCallEvent {
    ToolCallEvent::ToolCallDelta {
        tool_call_id: id.to_string(),
        args_text_delta: text.to_string(),
    }
}

fn finish(id: &str, tool: &str) -> ToolCallEvent {
    ToolCallEvent::ToolCall {
        tool_call_id: id.to_string(),
        tool_name: tool.to_string(),
        args: None,
    }
}

fn call(id: &str, tool: &str, args: serde_json::Value) -> ToolCallEvent {
    ToolCallEvent::ToolCall {
        tool_call_id: id.to_string(),
        tool_name: tool.to_string(),
        args: Some(args),
    }
}

// =============================================================================
// Tool Call Tests
// =============================================================================

mod tool_calls {
    use super::*;

    #[test]
    fn test_create_replace_view() {
        let mut session = ChatSession::new(EngineConfig::default());
        session.submit("make an app").expect("request");

        for event in [
            start("c1", "str_replace_editor"),
            delta("c1", r#"{"command":"create","path":"/App.jsx","#),
            delta("c1", r#""file_text":"a"}"#),
            finish("c1", "str_replace_editor"),
            call(
                "c2",
                "str_replace_editor",
                json!({"command": "str_replace", "path": "/App.jsx", "old_str": "a", "new_str": "b"}),
            ),
            call(
                "c3",
                "str_replace_editor",
                json!({"command": "view", "path": "/App.jsx"}),
            ),
        ] {
            session.handle_event(event).expect("valid event");
        }

        let invocations = &session.messages()[1].tool_invocations;
        assert_eq!(invocations.len(), 3);
        assert!(invocations.iter().all(|i| i.state == InvocationState::Result));
        assert_eq!(invocations[2].result, Some(atelier::ToolResult::Success(json!("b"))));
        assert_eq!(session.tree().get("/App.jsx").expect("file"), "b");
    }

    #[test]
    fn test_failures_are_reported_not_fatal() {
        let mut session = ChatSession::new(EngineConfig::default());
        session.submit("go").expect("request");

        session
            .handle_event(call(
                "c1",
                "str_replace_editor",
                json!({"command": "create", "path": "/a.js", "file_text": "x x"}),
            ))
            .expect("valid event");
        let step = session
            .handle_event(call(
                "c2",
                "str_replace_editor",
                json!({"command": "str_replace", "path": "/a.js", "old_str": "x", "new_str": "y"}),
            ))
            .expect("valid event");
        assert!(matches!(
            step,
            Step::Failed {
                error: ToolError::AmbiguousMatch { count: 2, .. },
                ..
            }
        ));

        // The model retries with more context
        session
            .handle_event(call(
                "c3",
                "str_replace_editor",
                json!({"command": "str_replace", "path": "/a.js", "old_str": "x x", "new_str": "y x"}),
            ))
            .expect("valid event");
        assert_eq!(session.tree().get("/a.js").expect("file"), "y x");

        let statuses: Vec<String> = session.messages()[1]
            .tool_invocations
            .iter()
            .map(|i| i.status().text)
            .collect();
        assert_eq!(statuses, ["Creating a.js", "Editing a.js", "Editing a.js"]);
    }

    #[test]
    fn test_rename_conflict_keeps_both_files() {
        let mut session = ChatSession::new(EngineConfig::default());
        session.submit("go").expect("request");

        for (id, path) in [("c1", "/a.js"), ("c2", "/b.js")] {
            session
                .handle_event(call(
                    id,
                    "str_replace_editor",
                    json!({"command": "create", "path": path, "file_text": path}),
                ))
                .expect("valid event");
        }
        let step = session
            .handle_event(call(
                "c3",
                "file_manager",
                json!({"command": "rename", "path": "/a.js", "new_path": "/b.js"}),
            ))
            .expect("valid event");

        assert!(matches!(step, Step::Failed { error: ToolError::Conflict(_), .. }));
        assert_eq!(session.tree().get("/a.js").expect("file"), "/a.js");
        assert_eq!(session.tree().get("/b.js").expect("file"), "/b.js");
    }

    #[test]
    fn test_truncated_call_never_applies() {
        let mut session = ChatSession::new(EngineConfig::default());
        session.submit("go").expect("request");

        session.handle_event(start("c1", "file_manager")).expect("start");
        session
            .handle_event(delta("c1", r#"{"command":"delete","path":"/a.js"}"#))
            .expect("delta");

        let status = session.sequencer().status("c1").expect("record");
        assert_eq!(status.text, "Deleting a.js");
        assert!(status.loading);
        assert!(session.tree().is_empty());
    }
}

// =============================================================================
// Snapshot Tests
// =============================================================================

mod snapshots {
    use super::*;

    #[test]
    fn test_round_trip_through_json() {
        let mut tree = FileTree::new();
        tree.set("/App.jsx", "export default App;").expect("set");
        tree.set("/components/Card.jsx", "card").expect("set");

        let json = tree.serialize().to_json().expect("encode");
        let mut restored = FileTree::new();
        restored
            .restore(&Snapshot::from_json(&json).expect("decode"))
            .expect("restore");

        assert_eq!(restored, tree);
    }

    #[test]
    fn test_request_snapshot_is_a_copy() {
        let mut session = ChatSession::new(EngineConfig::default());
        let first = session.submit("one").expect("request");
        session
            .handle_event(call(
                "c1",
                "str_replace_editor",
                json!({"command": "create", "path": "/a.js", "file_text": "1"}),
            ))
            .expect("valid event");

        assert!(first.files.is_empty());
        assert_eq!(session.request().files.get("/a.js"), Some("1"));
    }
}

// =============================================================================
// Sign-in Migration Tests
// =============================================================================

mod migration {
    use super::*;

    struct AcceptAll;

    #[async_trait]
    impl AuthBackend for AcceptAll {
        async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthResult, ServiceError> {
            Ok(AuthResult::ok())
        }

        async fn sign_up(&self, _email: &str, _password: &str) -> Result<AuthResult, ServiceError> {
            Ok(AuthResult::ok())
        }
    }

    fn flow(projects: &Arc<InMemoryProjectStore>, anon: &Arc<InMemoryAnonWorkStore>) -> AuthFlow {
        AuthFlow::new(Arc::new(AcceptAll), projects.clone(), anon.clone())
    }

    #[tokio::test]
    async fn test_empty_session_gets_new_design() {
        let projects = Arc::new(InMemoryProjectStore::new());
        let anon = Arc::new(InMemoryAnonWorkStore::new());
        let mut session = ChatSession::new(EngineConfig::default())
            .with_mirror(AnonWorkMirror::new(anon.clone()));

        // Nothing submitted: the mirror stays empty
        assert!(session.submit("").is_none());
        assert!(anon.load().is_none());

        let outcome = flow(&projects, &anon).sign_in("a@b.c", "pw").await.expect("sign in");

        let summaries = projects.get_projects().await.expect("list");
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].name.starts_with("New Design #"));
        assert_eq!(outcome.redirect, Some(format!("/{}", summaries[0].id)));

        let project = projects.get_project(&summaries[0].id).await.expect("get");
        assert!(project.messages.is_empty());
        assert!(project.data.is_empty());
    }

    #[tokio::test]
    async fn test_anon_work_migrates_once() {
        let projects = Arc::new(InMemoryProjectStore::new());
        projects
            .create_project(NewProject {
                name: "Older".to_string(),
                ..Default::default()
            })
            .await
            .expect("seed");
        let anon = Arc::new(InMemoryAnonWorkStore::new());

        let mut session = ChatSession::new(EngineConfig::default())
            .with_mirror(AnonWorkMirror::new(anon.clone()));
        session.submit("build a card").expect("request");
        session
            .handle_event(call(
                "c1",
                "str_replace_editor",
                json!({"command": "create", "path": "/Card.jsx", "file_text": "card"}),
            ))
            .expect("valid event");

        let outcome = flow(&projects, &anon).sign_in("a@b.c", "pw").await.expect("sign in");

        assert_eq!(outcome.redirect.as_deref(), Some("/proj-2"));
        assert_eq!(projects.len().await, 2);
        assert_eq!(projects.list_calls(), 0);
        assert_eq!(anon.clear_count(), 1);
        assert!(anon.load().is_none());

        let migrated = projects.get_project("proj-2").await.expect("get");
        assert!(migrated.name.starts_with("Design from "));
        assert_eq!(migrated.data.get("/Card.jsx"), Some("card"));
        assert_eq!(migrated.messages.len(), 2);

        // The migrated project reopens with the same files
        let mut reopened = ChatSession::new(EngineConfig::default());
        reopened
            .load_project(projects.as_ref(), "proj-2")
            .await
            .expect("load");
        assert_eq!(reopened.tree().get("/Card.jsx").expect("file"), "card");
    }

    #[tokio::test]
    async fn test_existing_user_lands_on_latest() {
        let projects = Arc::new(InMemoryProjectStore::new());
        for name in ["first", "second"] {
            projects
                .create_project(NewProject {
                    name: name.to_string(),
                    ..Default::default()
                })
                .await
                .expect("seed");
        }
        let anon = Arc::new(InMemoryAnonWorkStore::new());

        let outcome = flow(&projects, &anon).sign_up("a@b.c", "pw").await.expect("sign up");

        assert_eq!(outcome.redirect.as_deref(), Some("/proj-2"));
        assert_eq!(projects.create_calls(), 2);
    }
}
