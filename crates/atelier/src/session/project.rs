//! Persisted projects.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::message::Message;
use crate::clock;
use crate::vfs::Snapshot;

/// Failures of the persistence or auth backends.
///
/// These are surfaced to the caller; in-memory session state is never touched
/// when one occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No project with this id
    #[error("project not found: {0}")]
    NotFound(String),
    /// Network or server failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Stored data could not be loaded into a session
    #[error("invalid project data: {0}")]
    InvalidData(String),
}

/// A persisted project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project id
    pub id: String,
    /// Display name
    pub name: String,
    /// Conversation
    pub messages: Vec<Message>,
    /// Project files
    pub data: Snapshot,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 time of the last update
    pub updated_at: String,
}

/// Listing entry for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Project id
    pub id: String,
    /// Display name
    pub name: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 time of the last update
    pub updated_at: String,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            created_at: project.created_at.clone(),
            updated_at: project.updated_at.clone(),
        }
    }
}

/// Input for [`ProjectStore::create_project`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    /// Display name
    pub name: String,
    /// Initial conversation
    pub messages: Vec<Message>,
    /// Initial files
    pub data: Snapshot,
}

/// Persistence backend for the signed-in user's projects.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Create a project.
    async fn create_project(&self, project: NewProject) -> Result<Project, ServiceError>;

    /// List projects, most recently updated first.
    async fn get_projects(&self) -> Result<Vec<ProjectSummary>, ServiceError>;

    /// Fetch one project.
    async fn get_project(&self, id: &str) -> Result<Project, ServiceError>;

    /// Replace a project's conversation and files.
    async fn update_project(
        &self,
        id: &str,
        messages: Vec<Message>,
        data: Snapshot,
    ) -> Result<Project, ServiceError>;
}

/// Process-local [`ProjectStore`].
///
/// Records how often each listing and creation happened so callers can
/// assert on which backend calls a flow made.
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    // (revision, project); higher revision = more recent
    projects: RwLock<Vec<(u64, Project)>>,
    next_id: AtomicU64,
    revision: AtomicU64,
    offline: AtomicBool,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl InMemoryProjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`ServiceError::Transport`] while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `get_projects` calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `create_project` calls so far.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of stored projects.
    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    /// True when no project is stored.
    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }

    fn check_online(&self) -> Result<(), ServiceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("store is offline".to_string()));
        }
        Ok(())
    }

    fn bump(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn create_project(&self, project: NewProject) -> Result<Project, ServiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let id = format!("proj-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let now = clock::now_rfc3339();
        let created = Project {
            id,
            name: project.name,
            messages: project.messages,
            data: project.data,
            created_at: now.clone(),
            updated_at: now,
        };
        let revision = self.bump();
        self.projects.write().await.push((revision, created.clone()));
        tracing::info!(id = %created.id, name = %created.name, "project created");
        Ok(created)
    }

    async fn get_projects(&self) -> Result<Vec<ProjectSummary>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let projects = self.projects.read().await;
        let mut ordered: Vec<&(u64, Project)> = projects.iter().collect();
        ordered.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ordered.into_iter().map(|(_, p)| p.into()).collect())
    }

    async fn get_project(&self, id: &str) -> Result<Project, ServiceError> {
        self.check_online()?;
        self.projects
            .read()
            .await
            .iter()
            .find(|(_, p)| p.id == id)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn update_project(
        &self,
        id: &str,
        messages: Vec<Message>,
        data: Snapshot,
    ) -> Result<Project, ServiceError> {
        self.check_online()?;
        let revision = self.bump();
        let mut projects = self.projects.write().await;
        let (rev, project) = projects
            .iter_mut()
            .find(|(_, p)| p.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        *rev = revision;
        project.messages = messages;
        project.data = data;
        project.updated_at = clock::now_rfc3339();
        Ok(project.clone())
    }
}
