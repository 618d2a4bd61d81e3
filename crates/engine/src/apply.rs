use checksums::Fingerprint;
use protocol::{
    ContentDelta, FailureKind, ManifestEntry, ProtocolError, SyncBatch, SyncOutcome, SyncScope,
    UpdateOp,
};
use rustc_hash::FxHashMap;
use snapshot::{EntryKind, TreeSnapshot};
use tracing::{debug, warn};
use vfs::{Filesystem, FsError, NodeKind, path};

/// Target-side executor replaying a [`SyncBatch`] against a tree.
///
/// Every op is applied relative to `root`, which is created (ancestors
/// included) before the first batch touches it. Application stops at the
/// first failing op and reports it through [`SyncOutcome`]; the already
/// applied prefix is left in place, since a full retry of the batch is safe
/// against it.
#[derive(Clone, Debug)]
pub struct UpdateApplier {
    root: String,
}

impl UpdateApplier {
    /// Creates an applier rooted at `root` on the target filesystem.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    /// Target-relative root the applier writes beneath.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Applies `batch` to the target tree.
    ///
    /// A batch is untrusted once it has crossed the transport, so the
    /// ordering invariant is re-checked here and parent existence is
    /// verified against live target state before each creation.
    pub fn apply<F: Filesystem + ?Sized>(&self, fs: &F, batch: &SyncBatch) -> SyncOutcome {
        if let Err(err) = batch.check_order() {
            warn!(%err, "rejecting malformed batch");
            return SyncOutcome::failed(order_violation_path(&err), FailureKind::Protocol);
        }
        if let Err(outcome) = self.prepare_root(fs) {
            return outcome;
        }
        if let SyncScope::Full { manifest } = batch.scope() {
            if let Err(outcome) = self.remove_strays(fs, manifest) {
                return outcome;
            }
        }
        for op in batch.ops() {
            if let Err(outcome) = self.apply_op(fs, op) {
                return outcome;
            }
        }
        debug!(ops = batch.op_count(), "applied batch");
        SyncOutcome::Ok
    }

    /// Ensures the target root exists as a directory, creating missing
    /// ancestors and displacing a file squatting on the root path.
    fn prepare_root<F: Filesystem + ?Sized>(&self, fs: &F) -> Result<(), SyncOutcome> {
        if self.root.is_empty() {
            return Ok(());
        }
        let mut built = String::new();
        for component in self.root.split('/') {
            built = path::join(&built, component);
            if fs.kind_of(&built) == Some(NodeKind::File) {
                fs.remove_file(&built)
                    .map_err(|err| filesystem_failure(&built, &err))?;
            }
            fs.make_dir(&built)
                .map_err(|err| filesystem_failure(&built, &err))?;
        }
        Ok(())
    }

    /// Deletes every target entry the manifest does not account for, or
    /// accounts for with a different kind. Removals are topmost-first so a
    /// single directory removal covers its subtree.
    fn remove_strays<F: Filesystem + ?Sized>(
        &self,
        fs: &F,
        manifest: &[ManifestEntry],
    ) -> Result<(), SyncOutcome> {
        let expected: FxHashMap<&str, EntryKind> = manifest
            .iter()
            .map(|entry| (entry.path.as_str(), entry.kind))
            .collect();
        let held = TreeSnapshot::build(fs, &self.root)
            .map_err(|err| filesystem_failure(&self.root, &err))?;

        let mut removed: Vec<String> = Vec::new();
        for (rel, entry) in held.entries() {
            if removed.iter().any(|r| path::is_strict_ancestor(r, rel)) {
                continue;
            }
            let keep = expected.get(rel) == Some(&entry.kind());
            if keep {
                continue;
            }
            let abs = path::join(&self.root, rel);
            let result = if entry.is_dir() {
                fs.remove_dir(&abs)
            } else {
                fs.remove_file(&abs)
            };
            result.map_err(|err| filesystem_failure(rel, &err))?;
            debug!(path = rel, "removed stray");
            removed.push(rel.to_owned());
        }
        Ok(())
    }

    fn apply_op<F: Filesystem + ?Sized>(&self, fs: &F, op: &UpdateOp) -> Result<(), SyncOutcome> {
        let rel = op.path();
        if let Some(parent) = path::parent(rel) {
            if !parent.is_empty() && !fs.is_dir(&path::join(&self.root, parent)) {
                warn!(path = rel, parent, "op arrived before its parent directory");
                return Err(SyncOutcome::failed(rel, FailureKind::Protocol));
            }
        }
        let abs = path::join(&self.root, rel);
        match op {
            UpdateOp::Add {
                content: None,
                ..
            } => fs
                .make_dir(&abs)
                .map_err(|err| filesystem_failure(rel, &err)),
            UpdateOp::Add {
                content: Some(content),
                ..
            } => fs
                .write_file(&abs, content)
                .map_err(|err| filesystem_failure(rel, &err)),
            UpdateOp::Remove { .. } => match fs.kind_of(&abs) {
                None => Ok(()),
                Some(NodeKind::File) => fs
                    .remove_file(&abs)
                    .map_err(|err| filesystem_failure(rel, &err)),
                Some(NodeKind::Directory) => fs
                    .remove_dir(&abs)
                    .map_err(|err| filesystem_failure(rel, &err)),
            },
            UpdateOp::Modify { delta, .. } => self.apply_modify(fs, rel, &abs, delta),
        }
    }

    fn apply_modify<F: Filesystem + ?Sized>(
        &self,
        fs: &F,
        rel: &str,
        abs: &str,
        delta: &ContentDelta,
    ) -> Result<(), SyncOutcome> {
        match delta {
            ContentDelta::Full(content) => fs
                .write_file(abs, content)
                .map_err(|err| filesystem_failure(rel, &err)),
            ContentDelta::Chunks(delta) => {
                if fs.kind_of(abs) != Some(NodeKind::File) {
                    warn!(path = rel, "chunk delta targets a non-file path");
                    return Err(SyncOutcome::failed(rel, FailureKind::ContentDrift));
                }
                let mut held = fs
                    .read_file(abs)
                    .map_err(|err| filesystem_failure(rel, &err))?;
                let held_fp = Fingerprint::of(&held);
                // An at-least-once transport may deliver the same batch
                // twice; a file already at the result is a successful no-op.
                if held_fp == delta.result {
                    return Ok(());
                }
                if held_fp != delta.base {
                    warn!(path = rel, "chunk delta base does not match target content");
                    return Err(SyncOutcome::failed(rel, FailureKind::ContentDrift));
                }
                held.resize(delta.result_len as usize, 0);
                for patch in &delta.patches {
                    let start = patch.offset as usize;
                    let Some(end) = start.checked_add(patch.bytes.len()) else {
                        return Err(SyncOutcome::failed(rel, FailureKind::Protocol));
                    };
                    if end > held.len() {
                        warn!(path = rel, "chunk patch exceeds resulting length");
                        return Err(SyncOutcome::failed(rel, FailureKind::Protocol));
                    }
                    held[start..end].copy_from_slice(&patch.bytes);
                }
                // Patched in memory first; the file is only rewritten once
                // the result checks out, so drift never corrupts it.
                if Fingerprint::of(&held) != delta.result {
                    warn!(path = rel, "patched content failed verification");
                    return Err(SyncOutcome::failed(rel, FailureKind::ContentDrift));
                }
                fs.write_file(abs, &held)
                    .map_err(|err| filesystem_failure(rel, &err))
            }
        }
    }
}

fn filesystem_failure(rel: &str, err: &FsError) -> SyncOutcome {
    warn!(path = rel, %err, "filesystem op failed");
    SyncOutcome::failed(rel, FailureKind::Filesystem)
}

fn order_violation_path(err: &ProtocolError) -> &str {
    match err {
        ProtocolError::OpUnderRemovedSubtree { path, .. } => path,
        ProtocolError::ChildBeforeParent { child } => child,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ChunkDelta, ChunkPatch};
    use vfs::MemoryFs;

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
    fn apply_creates_root_and_replays_ops() {
        let fs = MemoryFs::new();
        let applier = UpdateApplier::new("dst/nested");
        let batch = SyncBatch::incremental(vec![add_dir("d"), add_file("d/f.txt", b"hi")]);

        assert!(applier.apply(&fs, &batch).is_ok());
        assert_eq!(fs.read_file("dst/nested/d/f.txt").expect("read"), b"hi");
    }

    #[test]
    fn reapplying_a_batch_is_idempotent() {
        let fs = MemoryFs::new();
        let applier = UpdateApplier::new("dst");
        let batch = SyncBatch::incremental(vec![
            add_dir("d"),
            add_file("d/f.txt", b"hi"),
            UpdateOp::Remove {
                path: "ghost".into(),
            },
        ]);

        assert!(applier.apply(&fs, &batch).is_ok());
        let before = fs.debug_string("dst");
        assert!(applier.apply(&fs, &batch).is_ok());
        assert_eq!(fs.debug_string("dst"), before);
    }

    #[test]
    fn malformed_batch_is_rejected_before_any_write() {
        let fs = MemoryFs::new();
        let applier = UpdateApplier::new("dst");
        let batch = SyncBatch::incremental(vec![add_file("d/f.txt", b"x"), add_dir("d")]);

        let outcome = applier.apply(&fs, &batch);
        assert_eq!(
            outcome,
            SyncOutcome::failed("d/f.txt", FailureKind::Protocol)
        );
        assert!(!fs.exists("dst"));
    }

    #[test]
    fn missing_parent_on_live_tree_is_a_protocol_failure() {
        let fs = MemoryFs::new();
        let applier = UpdateApplier::new("dst");
        // Statically ordered (the parent is not part of the batch) but the
        // target never held "d".
        let batch = SyncBatch::incremental(vec![add_file("d/f.txt", b"x")]);

        let outcome = applier.apply(&fs, &batch);
        assert_eq!(
            outcome,
            SyncOutcome::failed("d/f.txt", FailureKind::Protocol)
        );
    }

    #[test]
    fn full_scope_removes_strays_but_keeps_manifest_paths() {
        let fs = MemoryFs::new();
        fs.mkdir_p("dst/stray").expect("mkdir");
        fs.write_file("dst/stray/junk.txt", b"junk").expect("write");
        fs.mkdir_p("dst/keep").expect("mkdir keep");
        fs.write_file("dst/keep/same.txt", b"same").expect("write same");

        let mut tree = TreeSnapshot::empty();
        tree = tree.with_entry("keep", snapshot::Entry::directory());
        tree = tree.with_entry(
            "keep/same.txt",
            snapshot::Entry::file(Fingerprint::of(b"same"), 4),
        );
        // No op for keep/same.txt: the manifest alone must preserve it.
        let batch = SyncBatch::full(&tree, vec![add_dir("keep")]);

        let applier = UpdateApplier::new("dst");
        assert!(applier.apply(&fs, &batch).is_ok());
        assert!(!fs.exists("dst/stray"));
        assert_eq!(fs.read_file("dst/keep/same.txt").expect("read"), b"same");
        assert_eq!(fs.file_write_count("dst/keep/same.txt"), 1);
    }

    #[test]
    fn full_scope_replaces_kind_mismatches() {
        let fs = MemoryFs::new();
        fs.mkdir_p("dst").expect("mkdir");
        fs.write_file("dst/thing", b"was a file").expect("write");

        let tree = TreeSnapshot::empty().with_entry("thing", snapshot::Entry::directory());
        let batch = SyncBatch::full(&tree, vec![add_dir("thing")]);

        let applier = UpdateApplier::new("dst");
        assert!(applier.apply(&fs, &batch).is_ok());
        assert!(fs.is_dir("dst/thing"));
    }

    #[test]
    fn chunk_delta_patches_and_verifies() {
        let fs = MemoryFs::new();
        fs.mkdir_p("dst").expect("mkdir");
        let base = vec![0u8; 48];
        let mut result = base.clone();
        result[16..32].fill(7);
        fs.write_file("dst/big.bin", &base).expect("write base");

        let batch = SyncBatch::incremental(vec![UpdateOp::Modify {
            path: "big.bin".into(),
            delta: ContentDelta::Chunks(ChunkDelta {
                base: Fingerprint::of(&base),
                result: Fingerprint::of(&result),
                result_len: 48,
                patches: vec![ChunkPatch {
                    offset: 16,
                    bytes: vec![7u8; 16],
                }],
            }),
        }]);

        let applier = UpdateApplier::new("dst");
        assert!(applier.apply(&fs, &batch).is_ok());
        assert_eq!(fs.read_file("dst/big.bin").expect("read"), result);

        // Redelivery finds the file already at the result and rewrites
        // nothing.
        let writes = fs.file_write_count("dst/big.bin");
        assert!(applier.apply(&fs, &batch).is_ok());
        assert_eq!(fs.file_write_count("dst/big.bin"), writes);
    }

    #[test]
    fn drifted_base_refuses_the_patch_and_keeps_the_file() {
        let fs = MemoryFs::new();
        fs.mkdir_p("dst").expect("mkdir");
        fs.write_file("dst/big.bin", b"something else entirely")
            .expect("write");

        let base = vec![0u8; 32];
        let mut result = base.clone();
        result[0] = 1;
        let batch = SyncBatch::incremental(vec![UpdateOp::Modify {
            path: "big.bin".into(),
            delta: ContentDelta::Chunks(ChunkDelta {
                base: Fingerprint::of(&base),
                result: Fingerprint::of(&result),
                result_len: 32,
                patches: vec![ChunkPatch {
                    offset: 0,
                    bytes: vec![1],
                }],
            }),
        }]);

        let applier = UpdateApplier::new("dst");
        let outcome = applier.apply(&fs, &batch);
        assert_eq!(
            outcome,
            SyncOutcome::failed("big.bin", FailureKind::ContentDrift)
        );
        assert_eq!(
            fs.read_file("dst/big.bin").expect("read"),
            b"something else entirely"
        );
    }

    #[test]
    fn failure_leaves_the_applied_prefix_in_place() {
        let fs = MemoryFs::new();
        fs.mkdir_p("dst/d").expect("mkdir");
        let batch = SyncBatch::incremental(vec![
            add_file("d/first.txt", b"one"),
            add_file("missing/second.txt", b"two"),
        ]);

        let applier = UpdateApplier::new("dst");
        let outcome = applier.apply(&fs, &batch);
        assert!(!outcome.is_ok());
        assert_eq!(fs.read_file("dst/d/first.txt").expect("read"), b"one");
    }
}
