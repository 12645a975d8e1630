//! Anonymous work: what a signed-out user built, kept for migration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::vfs::{FileTree, Snapshot};

/// The latest conversation and project snapshot of an unbound session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonWorkRecord {
    /// Conversation so far
    pub messages: Vec<Message>,
    /// Project files at the time of the last update
    pub file_system_data: Snapshot,
}

impl AnonWorkRecord {
    /// True when there is a conversation worth migrating.
    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }
}

/// Storage for the single anonymous record, like browser session storage.
pub trait AnonWorkStore: Send + Sync {
    /// Read the record, if any.
    fn load(&self) -> Option<AnonWorkRecord>;

    /// Overwrite the record.
    fn save(&self, record: AnonWorkRecord);

    /// Delete the record.
    fn clear(&self);
}

/// Process-local [`AnonWorkStore`].
#[derive(Debug, Default)]
pub struct InMemoryAnonWorkStore {
    record: RwLock<Option<AnonWorkRecord>>,
    saves: AtomicUsize,
    clears: AtomicUsize,
}

impl InMemoryAnonWorkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a record.
    pub fn with_record(record: AnonWorkRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
            ..Self::default()
        }
    }

    /// How many times `save` was called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// How many times `clear` was called.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl AnonWorkStore for InMemoryAnonWorkStore {
    fn load(&self) -> Option<AnonWorkRecord> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, record: AnonWorkRecord) {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.record.write().unwrap_or_else(PoisonError::into_inner) = Some(record);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.record.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Mirrors an unbound session into an [`AnonWorkStore`].
#[derive(Clone)]
pub struct AnonWorkMirror {
    store: Arc<dyn AnonWorkStore>,
}

impl std::fmt::Debug for AnonWorkMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonWorkMirror").finish_non_exhaustive()
    }
}

impl AnonWorkMirror {
    /// Mirror into the given store.
    pub fn new(store: Arc<dyn AnonWorkStore>) -> Self {
        Self { store }
    }

    /// Record the session state when it is unbound and has messages.
    ///
    /// The stored record is replaced, never appended to. Returns whether a save
    /// happened.
    pub fn observe(&self, project_id: Option<&str>, messages: &[Message], tree: &FileTree) -> bool {
        if project_id.is_some() || messages.is_empty() {
            return false;
        }
        self.store.save(AnonWorkRecord {
            messages: messages.to_vec(),
            file_system_data: tree.serialize(),
        });
        tracing::debug!(messages = messages.len(), files = tree.len(), "mirrored anonymous work");
        true
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn AnonWorkStore> {
        &self.store
    }
}
