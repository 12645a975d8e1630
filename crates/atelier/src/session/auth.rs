//! Sign-in and sign-up, followed by migration of anonymous work.
//!
//! After a successful authentication the user lands on exactly one project:
//!
//! 1. anonymous work with messages becomes a new `Design from <time>` project
//!    and the anonymous record is cleared (existing projects are not queried);
//! 2. otherwise the most recently updated existing project;
//! 3. otherwise a fresh, empty `New Design #<n>` project.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::anon::AnonWorkStore;
use super::project::{NewProject, ProjectStore, ServiceError};
use crate::clock;
use crate::vfs::Snapshot;

/// Answer of the auth backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether the credentials were accepted
    pub success: bool,
    /// Reason for a rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResult {
    /// An accepted authentication.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A rejected authentication.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Credential check and account creation.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Check credentials and start a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResult, ServiceError>;

    /// Create an account and start a session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResult, ServiceError>;
}

/// What an authentication attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Backend answer
    pub result: AuthResult,
    /// Route to navigate to (`/<project id>`), set only on success
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum AuthKind {
    SignIn,
    SignUp,
}

/// Drives authentication and the post-auth landing decision.
pub struct AuthFlow {
    backend: Arc<dyn AuthBackend>,
    projects: Arc<dyn ProjectStore>,
    anon: Arc<dyn AnonWorkStore>,
    loading: AtomicBool,
}

impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

/// Clears the loading flag however the attempt ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AuthFlow {
    /// Create a flow over the given backends.
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        projects: Arc<dyn ProjectStore>,
        anon: Arc<dyn AnonWorkStore>,
    ) -> Self {
        Self {
            backend,
            projects,
            anon,
            loading: AtomicBool::new(false),
        }
    }

    /// True while an attempt is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Sign in, then land on a project.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthOutcome, ServiceError> {
        self.authenticate(AuthKind::SignIn, email, password).await
    }

    /// Sign up, then land on a project.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthOutcome, ServiceError> {
        self.authenticate(AuthKind::SignUp, email, password).await
    }

    async fn authenticate(
        &self,
        kind: AuthKind,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, ServiceError> {
        let _loading = LoadingGuard::set(&self.loading);

        let result = match kind {
            AuthKind::SignIn => self.backend.sign_in(email, password).await?,
            AuthKind::SignUp => self.backend.sign_up(email, password).await?,
        };
        if !result.success {
            tracing::debug!(?kind, "authentication rejected");
            return Ok(AuthOutcome {
                result,
                redirect: None,
            });
        }

        let project_id = self.resolve_landing().await?;
        Ok(AuthOutcome {
            result,
            redirect: Some(format!("/{project_id}")),
        })
    }

    async fn resolve_landing(&self) -> Result<String, ServiceError> {
        if let Some(record) = self.anon.load().filter(|r| r.has_messages()) {
            let project = self
                .projects
                .create_project(NewProject {
                    name: format!("Design from {}", clock::time_of_day()),
                    messages: record.messages,
                    data: record.file_system_data,
                })
                .await?;
            self.anon.clear();
            tracing::info!(id = %project.id, "migrated anonymous work");
            return Ok(project.id);
        }

        let projects = self.projects.get_projects().await?;
        if let Some(latest) = projects.into_iter().next() {
            return Ok(latest.id);
        }

        let project = self
            .projects
            .create_project(NewProject {
                name: new_design_name(),
                messages: Vec::new(),
                data: Snapshot::new(),
            })
            .await?;
        Ok(project.id)
    }
}

fn new_design_name() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("New Design #{n}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::anon::{AnonWorkRecord, InMemoryAnonWorkStore};
    use crate::session::message::Message;
    use crate::session::project::InMemoryProjectStore;

    struct FixedBackend(Result<AuthResult, ServiceError>);

    #[async_trait]
    impl AuthBackend for FixedBackend {
        async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthResult, ServiceError> {
            self.0.clone()
        }

        async fn sign_up(&self, _email: &str, _password: &str) -> Result<AuthResult, ServiceError> {
            self.0.clone()
        }
    }

    /// Answers only once the test releases it, announcing when it is called.
    struct GatedBackend {
        called: tokio::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
        release: tokio::sync::Mutex<Option<tokio::sync::oneshot::Receiver<AuthResult>>>,
    }

    impl GatedBackend {
        async fn answer(&self) -> Result<AuthResult, ServiceError> {
            if let Some(called) = self.called.lock().await.take() {
                let _ = called.send(());
            }
            let release = self.release.lock().await.take().unwrap();
            release
                .await
                .map_err(|e| ServiceError::Transport(e.to_string()))
        }
    }

    #[async_trait]
    impl AuthBackend for GatedBackend {
        async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthResult, ServiceError> {
            self.answer().await
        }

        async fn sign_up(&self, _email: &str, _password: &str) -> Result<AuthResult, ServiceError> {
            self.answer().await
        }
    }

    struct Fixture {
        flow: AuthFlow,
        projects: Arc<InMemoryProjectStore>,
        anon: Arc<InMemoryAnonWorkStore>,
    }

    fn fixture(answer: Result<AuthResult, ServiceError>, anon: Option<AnonWorkRecord>) -> Fixture {
        let projects = Arc::new(InMemoryProjectStore::new());
        let anon = Arc::new(match anon {
            Some(record) => InMemoryAnonWorkStore::with_record(record),
            None => InMemoryAnonWorkStore::new(),
        });
        let flow = AuthFlow::new(
            Arc::new(FixedBackend(answer)),
            projects.clone(),
            anon.clone(),
        );
        Fixture {
            flow,
            projects,
            anon,
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let fx = fixture(Ok(AuthResult::rejected("Invalid credentials")), None);

        let outcome = fx.flow.sign_in("test@test.com", "password").await.unwrap();

        assert_eq!(outcome.result, AuthResult::rejected("Invalid credentials"));
        assert_eq!(outcome.redirect, None);
        assert_eq!(fx.projects.list_calls(), 0);
        assert!(!fx.flow.is_loading());
    }

    #[tokio::test]
    async fn test_sign_up_migrates_anon_work() {
        let record = AnonWorkRecord {
            messages: vec![Message::user("m1", "hello")],
            file_system_data: Snapshot::new().with("/App.jsx", "x"),
        };
        let fx = fixture(Ok(AuthResult::ok()), Some(record));

        let outcome = fx.flow.sign_up("new@test.com", "password").await.unwrap();

        assert_eq!(outcome.redirect.as_deref(), Some("/proj-1"));
        let project = fx.projects.get_project("proj-1").await.unwrap();
        assert!(project.name.starts_with("Design from "));
        assert_eq!(project.messages.len(), 1);
        assert_eq!(project.data.get("/App.jsx"), Some("x"));
        assert_eq!(fx.anon.clear_count(), 1);
        assert_eq!(fx.projects.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_anon_work_without_messages_is_ignored() {
        let record = AnonWorkRecord {
            messages: Vec::new(),
            file_system_data: Snapshot::new().with("/App.jsx", "x"),
        };
        let fx = fixture(Ok(AuthResult::ok()), Some(record));
        fx.projects
            .create_project(NewProject {
                name: "Existing".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = fx.flow.sign_in("a@b.c", "pw").await.unwrap();

        assert_eq!(outcome.redirect.as_deref(), Some("/proj-1"));
        assert_eq!(fx.anon.clear_count(), 0);
        assert_eq!(fx.projects.list_calls(), 1);
        assert_eq!(fx.projects.len().await, 1);
    }

    #[tokio::test]
    async fn test_new_design_when_no_projects() {
        let fx = fixture(Ok(AuthResult::ok()), None);

        let outcome = fx.flow.sign_in("a@b.c", "pw").await.unwrap();

        let project = fx.projects.get_project("proj-1").await.unwrap();
        assert_eq!(outcome.redirect.as_deref(), Some("/proj-1"));
        let n = project.name.strip_prefix("New Design #").unwrap();
        assert!(n.parse::<u32>().unwrap() < 100_000);
        assert!(project.messages.is_empty());
        assert!(project.data.is_empty());
    }

    #[tokio::test]
    async fn test_loading_while_backend_pending() {
        let (called_tx, called_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel();
        let backend = GatedBackend {
            called: tokio::sync::Mutex::new(Some(called_tx)),
            release: tokio::sync::Mutex::new(Some(release_rx)),
        };
        let flow = Arc::new(AuthFlow::new(
            Arc::new(backend),
            Arc::new(InMemoryProjectStore::new()),
            Arc::new(InMemoryAnonWorkStore::new()),
        ));
        assert!(!flow.is_loading());

        let task = tokio::spawn({
            let flow = flow.clone();
            async move { flow.sign_in("a@b.c", "pw").await }
        });
        called_rx.await.unwrap();
        assert!(flow.is_loading());

        release_tx
            .send(AuthResult::rejected("Invalid credentials"))
            .unwrap();
        let outcome = task.await.unwrap().unwrap();

        assert_eq!(outcome.redirect, None);
        assert!(!flow.is_loading());
    }

    #[tokio::test]
    async fn test_backend_error_resets_loading() {
        let fx = fixture(Err(ServiceError::Transport("Network error".to_string())), None);

        let err = fx.flow.sign_in("a@b.c", "pw").await.unwrap_err();

        assert_eq!(err, ServiceError::Transport("Network error".to_string()));
        assert!(!fx.flow.is_loading());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_anon_work() {
        let record = AnonWorkRecord {
            messages: vec![Message::user("m1", "hello")],
            file_system_data: Snapshot::new(),
        };
        let fx = fixture(Ok(AuthResult::ok()), Some(record.clone()));
        fx.projects.set_offline(true);

        let err = fx.flow.sign_up("a@b.c", "pw").await.unwrap_err();

        assert!(matches!(err, ServiceError::Transport(_)));
        assert_eq!(fx.anon.load(), Some(record));
        assert_eq!(fx.anon.clear_count(), 0);
        assert!(!fx.flow.is_loading());
    }
}
