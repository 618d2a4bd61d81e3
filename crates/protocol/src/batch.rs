use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use snapshot::{EntryKind, TreeSnapshot};
use thiserror::Error;

use crate::op::UpdateOp;

/// Violation of the batch ordering invariant.
///
/// A malformed batch indicates a diff-engine bug, not a recoverable runtime
/// condition; sessions abort rather than retry when one is reported.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ProtocolError {
    /// An op addresses a path beneath a directory removed earlier in the
    /// same batch.
    #[error("op for '{path}' follows removal of its ancestor '{ancestor}'")]
    OpUnderRemovedSubtree {
        /// Path of the offending op.
        path: String,
        /// Previously removed ancestor.
        ancestor: String,
    },
    /// A creation op precedes the creation of its parent directory within
    /// the same batch even though the parent is part of the batch.
    #[error("op for '{child}' precedes the creation of its parent directory")]
    ChildBeforeParent {
        /// Path whose parent had not been created yet.
        child: String,
    },
}

/// Expected kind of one path in a full-sync manifest.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Root-relative path.
    pub path: String,
    /// Kind the target must end up holding at `path`.
    pub kind: EntryKind,
}

/// Scope of a sync batch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SyncScope {
    /// Full tree synchronization. The manifest lists every path the target
    /// must hold afterwards; anything else on the target is a stray and is
    /// deleted before the ops run. Paths in the manifest without a matching
    /// op keep their current content (the source knows it is already
    /// identical).
    Full {
        /// Complete expected tree shape, parent-before-child.
        manifest: Vec<ManifestEntry>,
    },
    /// Incremental update against a target already known to mirror the
    /// previous snapshot.
    Incremental,
}

/// Ordered sequence of update operations shipped in one sync cycle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    scope: SyncScope,
    ops: Vec<UpdateOp>,
}

impl SyncBatch {
    /// Creates a full-scope batch whose manifest mirrors `tree`.
    #[must_use]
    pub fn full(tree: &TreeSnapshot, ops: Vec<UpdateOp>) -> Self {
        let manifest = tree
            .entries()
            .map(|(path, entry)| ManifestEntry {
                path: path.to_owned(),
                kind: entry.kind(),
            })
            .collect();
        Self {
            scope: SyncScope::Full { manifest },
            ops,
        }
    }

    /// Creates an incremental batch.
    #[must_use]
    pub fn incremental(ops: Vec<UpdateOp>) -> Self {
        Self {
            scope: SyncScope::Incremental,
            ops,
        }
    }

    /// Scope of the batch.
    #[must_use]
    pub fn scope(&self) -> &SyncScope {
        &self.scope
    }

    /// Ops in application order.
    #[must_use]
    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// Replaces the op addressing `path` with `replacement`.
    ///
    /// Used by the source when the target reports content drift: the chunk
    /// delta for the drifted file is swapped for full content and the whole
    /// batch retried. Returns `false` when no op addresses `path`.
    pub fn replace_op_at(&mut self, path: &str, replacement: UpdateOp) -> bool {
        for op in &mut self.ops {
            if op.path() == path {
                *op = replacement;
                return true;
            }
        }
        false
    }

    /// Number of ops in the batch.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Reports whether the batch performs no work.
    ///
    /// A full-scope batch is never considered empty: its manifest alone
    /// instructs the target to delete strays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && matches!(self.scope, SyncScope::Incremental)
    }

    /// Total payload bytes carried by the batch's ops.
    #[must_use]
    pub fn payload_bytes(&self) -> u64 {
        self.ops.iter().map(UpdateOp::payload_bytes).sum()
    }

    /// Verifies the statically checkable ordering invariant.
    ///
    /// Checks that no op addresses a path beneath a subtree removed earlier
    /// in the batch, and that when a parent directory is created by the
    /// batch, its creation precedes every op on its children.
    pub fn check_order(&self) -> Result<(), ProtocolError> {
        let mut removed: Vec<String> = Vec::new();
        let mut created_dirs: BTreeSet<&str> = BTreeSet::new();
        let batch_dirs: BTreeSet<&str> = self
            .ops
            .iter()
            .filter(|op| op.creates_directory())
            .map(|op| op.path())
            .collect();

        for op in &self.ops {
            let path = op.path();
            if let Some(ancestor) = removed
                .iter()
                .find(|r| vfs::path::is_strict_ancestor(r, path))
            {
                return Err(ProtocolError::OpUnderRemovedSubtree {
                    path: path.to_owned(),
                    ancestor: ancestor.clone(),
                });
            }
            if let Some(parent) = vfs::path::parent(path) {
                if !parent.is_empty()
                    && batch_dirs.contains(parent)
                    && !created_dirs.contains(parent)
                {
                    return Err(ProtocolError::ChildBeforeParent {
                        child: path.to_owned(),
                    });
                }
            }
            match op {
                UpdateOp::Remove { path } => {
                    created_dirs.remove(path.as_str());
                    removed.push(path.clone());
                }
                UpdateOp::Add { path, content } => {
                    removed.retain(|r| r != path);
                    if content.is_none() {
                        created_dirs.insert(path);
                    }
                }
                UpdateOp::Modify { .. } => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::ContentDelta;

    fn add_dir(path: &str) -> UpdateOp {
        UpdateOp::Add {
            path: path.into(),
            content: None,
        }
    }

    fn add_file(path: &str, content: &[u8]) -> UpdateOp {
        UpdateOp::Add {
            path: path.into(),
            content: Some(content.to_vec()),
        }
    }

    #[test]
    fn parent_before_child_passes_order_check() {
        let batch = SyncBatch::incremental(vec![
            add_dir("a"),
            add_dir("a/b"),
            add_file("a/b/f.txt", b"x"),
        ]);
        batch.check_order().expect("ordered batch");
    }

    #[test]
    fn child_before_parent_is_rejected() {
        let batch = SyncBatch::incremental(vec![add_file("a/f.txt", b"x"), add_dir("a")]);
        let err = batch.check_order().expect_err("unordered batch");
        assert!(matches!(err, ProtocolError::ChildBeforeParent { .. }));
    }

    #[test]
    fn op_under_removed_subtree_is_rejected() {
        let batch = SyncBatch::incremental(vec![
            UpdateOp::Remove { path: "d".into() },
            add_file("d/f.txt", b"x"),
        ]);
        let err = batch.check_order().expect_err("op under removed subtree");
        assert!(matches!(err, ProtocolError::OpUnderRemovedSubtree { .. }));
    }

    #[test]
    fn readding_a_removed_directory_is_legal() {
        let batch = SyncBatch::incremental(vec![
            UpdateOp::Remove { path: "d".into() },
            add_dir("d"),
            add_file("d/f.txt", b"x"),
        ]);
        batch.check_order().expect("remove then re-add");
    }

    #[test]
    fn replace_op_swaps_delta_for_full_content() {
        let mut batch = SyncBatch::incremental(vec![UpdateOp::Modify {
            path: "big.bin".into(),
            delta: ContentDelta::Full(vec![0]),
        }]);
        let swapped = batch.replace_op_at(
            "big.bin",
            UpdateOp::Modify {
                path: "big.bin".into(),
                delta: ContentDelta::Full(vec![1, 2]),
            },
        );
        assert!(swapped);
        assert_eq!(batch.payload_bytes(), 2);
        assert!(!batch.replace_op_at("other", add_dir("other")));
    }

    #[test]
    fn full_scope_batch_is_never_empty() {
        let batch = SyncBatch::full(&TreeSnapshot::empty(), Vec::new());
        assert!(!batch.is_empty());
        assert!(SyncBatch::incremental(Vec::new()).is_empty());
    }

    #[test]
    fn batch_round_trips_through_serde() {
        let batch = SyncBatch::incremental(vec![
            add_dir("d"),
            add_file("d/f", b"bytes"),
            UpdateOp::Remove { path: "old".into() },
        ]);
        let json = serde_json::to_string(&batch).expect("serialize");
        let back: SyncBatch = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, batch);
    }
}
