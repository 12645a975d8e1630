//! One chat session: a conversation plus the project it is building.

use serde::{Deserialize, Serialize};

use super::anon::AnonWorkMirror;
use super::message::{ContentPart, Message, MessageContent, Role};
use super::project::{Project, ProjectStore, ServiceError};
use crate::agent::{SequenceError, Step, ToolCallEvent, ToolCallSequencer};
use crate::config::EngineConfig;
use crate::vfs::{FileTree, FsError, Snapshot};

/// Body of an outbound request to the chat transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Full conversation
    pub messages: Vec<Message>,
    /// Full current project
    pub files: Snapshot,
    /// Bound project, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Owns the tree, the call sequencer and the message history of a session.
///
/// Only [`ChatSession::handle_event`] writes the tree.
#[derive(Debug)]
pub struct ChatSession {
    project_id: Option<String>,
    messages: Vec<Message>,
    tree: FileTree,
    sequencer: ToolCallSequencer,
    pasted_image: Option<String>,
    mirror: Option<AnonWorkMirror>,
    next_message: usize,
}

impl ChatSession {
    /// An unbound session with an empty project.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            project_id: None,
            messages: Vec::new(),
            tree: FileTree::new(),
            sequencer: ToolCallSequencer::new(config),
            pasted_image: None,
            mirror: None,
            next_message: 0,
        }
    }

    /// A session bound to a persisted project.
    pub fn for_project(
        config: EngineConfig,
        project_id: impl Into<String>,
        messages: Vec<Message>,
        snapshot: &Snapshot,
    ) -> Result<Self, FsError> {
        let mut session = Self::new(config);
        session.tree = FileTree::from_snapshot(snapshot)?;
        session.next_message = messages.len();
        session.messages = messages;
        session.project_id = Some(project_id.into());
        Ok(session)
    }

    /// Mirror this session's work while it is unbound.
    pub fn with_mirror(mut self, mirror: AnonWorkMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Bound project id.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Conversation so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The project tree.
    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    /// Tool calls of the current turn.
    pub fn sequencer(&self) -> &ToolCallSequencer {
        &self.sequencer
    }

    /// Stage (or unstage) an image to send with the next message.
    pub fn set_pasted_image(&mut self, image: Option<String>) {
        self.pasted_image = image;
    }

    /// The staged image, if any.
    pub fn pasted_image(&self) -> Option<&str> {
        self.pasted_image.as_deref()
    }

    /// Append the user's input and build the outbound request.
    ///
    /// Returns `None` when there is nothing to send.
    pub fn submit(&mut self, input: &str) -> Option<ChatRequest> {
        let text = input.trim();
        let content = match self.pasted_image.take() {
            Some(image) => {
                let mut parts = Vec::with_capacity(2);
                if !text.is_empty() {
                    parts.push(ContentPart::Text {
                        text: text.to_string(),
                    });
                }
                parts.push(ContentPart::Image { image });
                MessageContent::Parts(parts)
            }
            None if text.is_empty() => return None,
            None => MessageContent::Text(text.to_string()),
        };

        let id = self.next_id();
        self.messages.push(Message::new(id, Role::User, content));
        self.sequencer.reset();
        self.notify_mirror();
        Some(self.request())
    }

    /// The outbound request for the current state.
    pub fn request(&self) -> ChatRequest {
        ChatRequest {
            messages: self.messages.clone(),
            files: self.tree.serialize(),
            project_id: self.project_id.clone(),
        }
    }

    /// Feed one tool-call event from the transport.
    pub fn handle_event(&mut self, event: ToolCallEvent) -> Result<Step, SequenceError> {
        let step = self.sequencer.handle(&mut self.tree, event)?;
        let invocations = self.sequencer.tool_invocations();
        self.assistant_message().tool_invocations = invocations;
        self.notify_mirror();
        Ok(step)
    }

    /// Append streamed assistant text.
    pub fn push_assistant_text(&mut self, text: &str) {
        let message = self.assistant_message();
        match &mut message.content {
            MessageContent::Text(existing) => existing.push_str(text),
            MessageContent::Parts(parts) => parts.push(ContentPart::Text {
                text: text.to_string(),
            }),
        }
        self.notify_mirror();
    }

    /// Replace this session with a persisted project.
    ///
    /// Nothing changes unless the project was fetched and its files restored.
    pub async fn load_project(&mut self, store: &dyn ProjectStore, id: &str) -> Result<(), ServiceError> {
        let project = store.get_project(id).await?;
        let tree = FileTree::from_snapshot(&project.data)
            .map_err(|e| ServiceError::InvalidData(e.to_string()))?;

        self.tree = tree;
        self.next_message = project.messages.len();
        self.messages = project.messages;
        self.project_id = Some(project.id);
        self.sequencer.reset();
        tracing::info!(id = %id, files = self.tree.len(), "loaded project");
        Ok(())
    }

    /// Save the conversation and files to the bound project.
    ///
    /// Unbound sessions have nothing to save and return `None`.
    pub async fn persist(&self, store: &dyn ProjectStore) -> Result<Option<Project>, ServiceError> {
        let Some(id) = &self.project_id else {
            return Ok(None);
        };
        let project = store
            .update_project(id, self.messages.clone(), self.tree.serialize())
            .await?;
        Ok(Some(project))
    }

    fn assistant_message(&mut self) -> &mut Message {
        if self.messages.last().is_none_or(|m| m.role != Role::Assistant) {
            let id = self.next_id();
            self.messages.push(Message::assistant(id, ""));
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    fn next_id(&mut self) -> String {
        self.next_message += 1;
        format!("msg-{}", self.next_message)
    }

    fn notify_mirror(&self) {
        if let Some(mirror) = &self.mirror {
            mirror.observe(self.project_id(), &self.messages, &self.tree);
        }
    }
}
