//! Chat sessions and what surrounds them.
//!
//! A [`ChatSession`] owns one project tree and one conversation. While it is
//! not bound to a persisted project, an [`AnonWorkMirror`] keeps the latest
//! `(messages, snapshot)` pair so that [`AuthFlow`] can migrate it into a new
//! project when the user signs in.

mod anon;
mod auth;
mod chat;
mod message;
mod project;

pub use anon::{AnonWorkMirror, AnonWorkRecord, AnonWorkStore, InMemoryAnonWorkStore};
pub use auth::{AuthBackend, AuthFlow, AuthOutcome, AuthResult};
pub use chat::{ChatRequest, ChatSession};
pub use message::{ContentPart, Message, MessageContent, Role};
pub use project::{
    InMemoryProjectStore, NewProject, Project, ProjectStore, ProjectSummary, ServiceError,
};
