#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `protocol` defines the wire model carried by the replication transport:
//! the [`UpdateOp`] sum type, the ordered [`SyncBatch`] shipped per sync
//! cycle, and the [`SyncOutcome`] the target returns. Every type derives
//! `serde` so any transport that can move serialized values can carry a sync.
//!
//! # Ordering invariant
//!
//! Within a batch, the op creating a directory precedes every op addressing
//! its children, and the removal of a directory is a single op covering its
//! whole subtree. [`SyncBatch::check_order`] verifies the statically
//! checkable part of the invariant; the applier additionally verifies parent
//! existence against live target state, since a batch is untrusted input
//! once it has crossed the network.
//!
//! # Full-scope batches
//!
//! A full sync carries a [`manifest`](SyncScope::Full) describing the entire
//! expected tree. The manifest lets the target delete stray entries while
//! preserving paths whose content was deliberately omitted from the ops
//! because the source already knows the target holds identical bytes.

mod batch;
mod op;
mod outcome;

pub use batch::{ManifestEntry, ProtocolError, SyncBatch, SyncScope};
pub use op::{ChunkDelta, ChunkPatch, ContentDelta, UpdateOp};
pub use outcome::{FailureKind, SyncOutcome};
