//! Virtual filesystem for the project under construction.
//!
//! This module provides:
//! - `FileTree` - authoritative path-to-content store for one session
//! - `Snapshot` - immutable `path -> content` copy passed across the system boundary
//!
//! Nothing here knows about tool calls; the interpreter in [`crate::agent`] is
//! the only writer.

mod snapshot;
mod tree;

pub use snapshot::{Snapshot, SnapshotError};
pub use tree::{DirEntry, FileNode, FileTree, FsError, NodeKind, Removed, Renamed, normalize_path};
