//! Path-keyed project tree.
//!
//! Files live in one ordered map keyed by normalized absolute path. Directories
//! are never stored: a path is a directory when at least one file lives beneath
//! it. Uniqueness and "no dangling entries" therefore reduce to map-level checks,
//! and a rename is a key swap performed under a single `&mut` borrow.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::snapshot::Snapshot;

/// Errors raised by [`FileTree`] operations.
///
/// A failed operation always leaves the tree exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// No file or directory at the path
    #[error("file not found: {0}")]
    NotFound(String),
    /// The path (or a path it would collide with) is already occupied
    #[error("path already exists: {0}")]
    Conflict(String),
    /// Path is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),
    /// Invalid path format
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Whether a node is a file or an implicit directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A file with text content
    File,
    /// A directory implied by the files beneath it
    Directory,
}

/// A node as seen through the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode<'a> {
    /// Normalized absolute path
    pub path: String,
    /// File or directory
    pub kind: NodeKind,
    /// Text content, `None` for directories
    pub content: Option<&'a str>,
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (last path segment)
    pub name: String,
    /// File or directory
    pub kind: NodeKind,
}

/// Paths removed by [`FileTree::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    /// Every file path that was removed, in path order
    pub paths: Vec<String>,
}

/// Key moves performed by [`FileTree::rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed {
    /// `(old, new)` pairs, one per moved file
    pub moves: Vec<(String, String)>,
}

/// Normalize a path to the tree's canonical form.
///
/// Relative paths are anchored at the root, repeated and trailing slashes are
/// dropped, and `.`/`..` segments are resolved. Walking above the root is an
/// error. The root itself normalizes to `/`.
pub fn normalize_path(path: &str) -> Result<String, FsError> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(FsError::InvalidPath(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}

/// Normalize a path that must name a file (anything but the root).
fn file_path(path: &str) -> Result<String, FsError> {
    let normalized = normalize_path(path)?;
    if normalized == "/" {
        return Err(FsError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}

fn dir_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        format!("{path}/")
    }
}

/// The project tree: the single owner of every file in a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    files: BTreeMap<String, String>,
}

impl FileTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, FsError> {
        let mut tree = Self::new();
        tree.restore(snapshot)?;
        Ok(tree)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the tree holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate `(path, content)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Iterate file paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Read a file's content.
    pub fn get(&self, path: &str) -> Result<&str, FsError> {
        let path = file_path(path)?;
        self.files
            .get(&path)
            .map(String::as_str)
            .ok_or(FsError::NotFound(path))
    }

    /// Create or overwrite a file.
    ///
    /// Fails only when the path is malformed or would make a file and a
    /// directory share a path.
    pub fn set(&mut self, path: &str, content: impl Into<String>) -> Result<(), FsError> {
        let path = file_path(path)?;
        if self.has_descendants(&path) {
            return Err(FsError::Conflict(path));
        }
        if let Some(ancestor) = self.file_ancestor(&path) {
            return Err(FsError::Conflict(ancestor));
        }
        self.files.insert(path, content.into());
        Ok(())
    }

    /// Remove a file, or a directory together with everything under it.
    pub fn remove(&mut self, path: &str) -> Result<Removed, FsError> {
        let path = file_path(path)?;
        if self.files.remove(&path).is_some() {
            return Ok(Removed { paths: vec![path] });
        }

        let paths: Vec<String> = self.descendants(&path).map(|(k, _)| k.clone()).collect();
        if paths.is_empty() {
            return Err(FsError::NotFound(path));
        }
        for key in &paths {
            self.files.remove(key);
        }
        Ok(Removed { paths })
    }

    /// Rename a file or directory.
    ///
    /// Every move is validated before any key changes, so the old and new keys
    /// never coexist and neither is ever missing.
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<Renamed, FsError> {
        let from = file_path(old_path)?;
        let to = file_path(new_path)?;

        let moves: Vec<(String, String)> = if self.files.contains_key(&from) {
            vec![(from.clone(), to.clone())]
        } else {
            let prefix = dir_prefix(&from);
            let moves: Vec<(String, String)> = self
                .descendants(&from)
                .map(|(k, _)| (k.clone(), format!("{to}/{}", &k[prefix.len()..])))
                .collect();
            if moves.is_empty() {
                return Err(FsError::NotFound(from));
            }
            if to.starts_with(&prefix) {
                return Err(FsError::InvalidPath(to));
            }
            moves
        };

        if self.exists_normalized(&to) {
            return Err(FsError::Conflict(to));
        }
        // The source key itself is vacated by the move.
        if let Some(ancestor) = self.file_ancestor(&to).filter(|a| *a != from) {
            return Err(FsError::Conflict(ancestor));
        }

        let contents: Vec<String> = moves
            .iter()
            .filter_map(|(old, _)| self.files.remove(old))
            .collect();
        for ((_, new), content) in moves.iter().zip(contents) {
            self.files.insert(new.clone(), content);
        }
        Ok(Renamed { moves })
    }

    /// True when a file or directory exists at the path.
    pub fn exists(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|p| self.exists_normalized(&p))
            .unwrap_or(false)
    }

    /// True when the path is a directory (the root always is).
    pub fn is_dir(&self, path: &str) -> bool {
        match normalize_path(path) {
            Ok(p) => p == "/" || self.has_descendants(&p),
            Err(_) => false,
        }
    }

    /// Look up a node, file or directory.
    pub fn node(&self, path: &str) -> Option<FileNode<'_>> {
        let path = normalize_path(path).ok()?;
        if let Some(content) = self.files.get(&path) {
            return Some(FileNode {
                path,
                kind: NodeKind::File,
                content: Some(content.as_str()),
            });
        }
        if path == "/" || self.has_descendants(&path) {
            return Some(FileNode {
                path,
                kind: NodeKind::Directory,
                content: None,
            });
        }
        None
    }

    /// List the immediate children of a directory, sorted by name.
    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let path = normalize_path(path)?;
        if self.files.contains_key(&path) {
            return Err(FsError::NotADirectory(path));
        }

        let prefix = dir_prefix(&path);
        let mut children: BTreeMap<&str, NodeKind> = BTreeMap::new();
        for (key, _) in self.descendants(&path) {
            let rest = &key[prefix.len()..];
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(dir, NodeKind::Directory);
                }
                None => {
                    children.insert(rest, NodeKind::File);
                }
            }
        }

        if children.is_empty() && path != "/" {
            return Err(FsError::NotFound(path));
        }
        Ok(children
            .into_iter()
            .map(|(name, kind)| DirEntry {
                name: name.to_string(),
                kind,
            })
            .collect())
    }

    /// Copy the tree into a transport-safe snapshot.
    pub fn serialize(&self) -> Snapshot {
        self.files
            .iter()
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect()
    }

    /// Replace the whole tree with a snapshot's content.
    ///
    /// The snapshot is validated into a fresh tree first; on error `self` is
    /// left untouched.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), FsError> {
        let mut fresh = Self::new();
        for (path, content) in snapshot.iter() {
            let normalized = file_path(path)?;
            if fresh.files.contains_key(&normalized) {
                return Err(FsError::Conflict(normalized));
            }
            fresh.set(&normalized, content)?;
        }
        *self = fresh;
        Ok(())
    }

    fn exists_normalized(&self, path: &str) -> bool {
        path == "/" || self.files.contains_key(path) || self.has_descendants(path)
    }

    fn descendants<'a>(&'a self, path: &str) -> impl Iterator<Item = (&'a String, &'a String)> {
        let prefix = dir_prefix(path);
        self.files
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(&prefix))
    }

    fn has_descendants(&self, path: &str) -> bool {
        self.descendants(path).next().is_some()
    }

    /// First proper ancestor of `path` that is currently a file.
    fn file_ancestor(&self, path: &str) -> Option<String> {
        let mut current = path;
        while let Some(idx) = current.rfind('/') {
            if idx == 0 {
                break;
            }
            current = &current[..idx];
            if self.files.contains_key(current) {
                return Some(current.to_string());
            }
        }
        None
    }
}
