#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `vfs` defines the filesystem and change-notification capabilities consumed
//! by the treesync replication engine. The replicator never touches
//! `std::fs` directly; it works against the [`Filesystem`] trait so the same
//! engine code drives a real directory tree and the deterministic in-memory
//! implementation used throughout the test suite.
//!
//! # Design
//!
//! - [`Filesystem`] is the capability set the engine needs: existence and
//!   kind queries, whole-file reads and writes, directory creation, recursive
//!   removal, sorted child listing, and a stable diagnostic dump.
//! - [`WatchCapability`] is the change-notification primitive: registering a
//!   callback on a directory yields immediate-child [`WatchEvent`]s until the
//!   directory is unwatched. Both `watch` and `unwatch` are idempotent.
//! - [`MemoryFs`] implements both capabilities with a flat, lexicographically
//!   ordered node map, synchronous event delivery, and per-path write
//!   counters so redundant-write avoidance is directly observable.
//! - [`StdFilesystem`] adapts the non-watch capability subset onto a base
//!   directory using `std::fs`; OS-level change notification stays an
//!   external collaborator.
//!
//! # Invariants
//!
//! - All capability paths are relative, slash-separated, and normalized; the
//!   empty string names the capability root. Paths containing `.`, `..`, or
//!   empty components are rejected with [`FsError`] before touching any
//!   state.
//! - Every parent of a stored path is itself stored as a directory; strict
//!   `make_dir` never creates missing ancestors.
//! - Watch callbacks are delivered after the mutation that produced them has
//!   fully committed, never while internal state is mid-update.

mod error;
mod memory;
pub mod path;
mod std_fs;
mod watch;

use std::fmt::Write as _;

pub use error::{FsError, FsErrorKind};
pub use memory::MemoryFs;
pub use std_fs::StdFilesystem;
pub use watch::{ChangeKind, WatchCallback, WatchCapability, WatchEvent, WatchHandle};

/// Kind of node a path resolves to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// Regular file carrying byte content.
    File,
    /// Directory containing zero or more children.
    Directory,
}

/// Filesystem capability set consumed by the replication engine.
///
/// Implementations use interior mutability where required; every method takes
/// `&self` so a source reader and a target writer can share one handle in
/// loopback deployments.
pub trait Filesystem {
    /// Returns the kind of the node at `path`, or `None` if nothing exists
    /// there.
    fn kind_of(&self, path: &str) -> Option<NodeKind>;

    /// Reads the full content of the file at `path`.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Creates or overwrites the file at `path` with `content`.
    ///
    /// The parent directory must already exist. Writing over a directory is
    /// an error.
    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    /// Creates the directory at `path`.
    ///
    /// The parent must already exist. Succeeds without effect when `path` is
    /// already a directory; fails when a file occupies it.
    fn make_dir(&self, path: &str) -> Result<(), FsError>;

    /// Removes the file at `path`.
    fn remove_file(&self, path: &str) -> Result<(), FsError>;

    /// Removes the directory at `path` together with its entire subtree.
    fn remove_dir(&self, path: &str) -> Result<(), FsError>;

    /// Returns the names of the immediate children of the directory at
    /// `path`, sorted lexicographically.
    fn list_children(&self, path: &str) -> Result<Vec<String>, FsError>;

    /// Reports whether anything exists at `path`.
    fn exists(&self, path: &str) -> bool {
        self.kind_of(path).is_some()
    }

    /// Reports whether a regular file exists at `path`.
    fn is_file(&self, path: &str) -> bool {
        self.kind_of(path) == Some(NodeKind::File)
    }

    /// Reports whether a directory exists at `path`.
    fn is_dir(&self, path: &str) -> bool {
        self.kind_of(path) == Some(NodeKind::Directory)
    }

    /// Renders the subtree rooted at `path` as a stable, indented listing.
    ///
    /// Intended for diagnostics and test assertions; the output is sorted so
    /// two structurally equal subtrees always render identically.
    fn debug_string(&self, path: &str) -> String {
        let mut out = String::new();
        render_subtree(self, path, 0, &mut out);
        out
    }
}

fn render_subtree<F: Filesystem + ?Sized>(fs: &F, path: &str, depth: usize, out: &mut String) {
    let name = if path.is_empty() {
        "."
    } else {
        path::file_name(path)
    };
    let indent = "  ".repeat(depth);
    match fs.kind_of(path) {
        None => {
            let _ = writeln!(out, "{indent}{name} (missing)");
        }
        Some(NodeKind::File) => {
            let len = fs.read_file(path).map(|c| c.len()).unwrap_or(0);
            let _ = writeln!(out, "{indent}{name} ({len} bytes)");
        }
        Some(NodeKind::Directory) => {
            let _ = writeln!(out, "{indent}{name}/");
            if let Ok(children) = fs.list_children(path) {
                for child in children {
                    render_subtree(fs, &path::join(path, &child), depth + 1, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_string_renders_sorted_subtree() {
        let fs = MemoryFs::new();
        fs.make_dir("root").expect("mkdir");
        fs.make_dir("root/b").expect("mkdir b");
        fs.write_file("root/a.txt", b"hello").expect("write a");
        fs.write_file("root/b/c.txt", b"x").expect("write c");

        let dump = fs.debug_string("root");
        let expected = "root/\n  a.txt (5 bytes)\n  b/\n    c.txt (1 bytes)\n";
        assert_eq!(dump, expected);
    }

    #[test]
    fn debug_string_marks_missing_paths() {
        let fs = MemoryFs::new();
        assert_eq!(fs.debug_string("nope"), "nope (missing)\n");
    }
}
