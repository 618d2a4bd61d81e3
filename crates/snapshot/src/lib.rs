#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `snapshot` captures the shape and content identity of a directory subtree
//! at one point in time. A [`TreeSnapshot`] maps normalized relative paths to
//! [`Entry`] values (kind, content fingerprint, size); it is built by a full
//! enumeration of a replication root and never patched in place. The session
//! derives each successor snapshot as a new value from the previous one plus
//! the subtree it re-read, so two snapshots can always be compared without
//! aliasing concerns.
//!
//! # Invariants
//!
//! - Paths within a snapshot are unique, normalized, and relative to the
//!   replication root; the root itself is implicit and carries no entry.
//! - Every non-root entry's parent path is present as a directory: a child
//!   is never recorded while its ancestor is missing.
//! - Directories carry no fingerprint and compare equal by existence; files
//!   compare by fingerprint.

mod entry;
mod tree;

pub use entry::{Entry, EntryKind};
pub use tree::{TreeDiff, TreeSnapshot};
