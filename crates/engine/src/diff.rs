use checksums::Fingerprint;
use protocol::{ChunkDelta, ChunkPatch, ContentDelta, SyncBatch, UpdateOp};
use snapshot::{Entry, TreeSnapshot};
use tracing::debug;
use vfs::{Filesystem, NodeKind, WatchEvent, path};

use crate::cache::SignatureCache;
use crate::config::SyncConfig;
use crate::error::EngineError;

/// Output of one planning pass: the batch to ship and the snapshot the
/// source records once the target acknowledges it.
#[derive(Clone, Debug)]
pub struct SyncPlan {
    /// Ordered ops, plus the manifest for full-scope syncs.
    pub batch: SyncBatch,
    /// Source tree state the batch converges the target to.
    pub next: TreeSnapshot,
}

/// Source-side planner turning tree state and watch events into batches.
///
/// Planning is read-only with respect to the source filesystem; the only
/// state it mutates is the caller's [`SignatureCache`], which must always
/// describe the content most recently acknowledged by the target.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiffEngine {
    config: SyncConfig,
}

impl DiffEngine {
    /// Creates a planner with the given policies.
    #[must_use]
    pub const fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Policies the planner was built with.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Plans a full synchronization of the subtree at `root`.
    ///
    /// Every directory gets an op; a file op is skipped when `last_applied`
    /// already records the same fingerprint, since the manifest alone keeps
    /// the target from deleting it. With no baseline, everything ships.
    pub fn initial_plan<F: Filesystem + ?Sized>(
        &self,
        fs: &F,
        root: &str,
        last_applied: Option<&TreeSnapshot>,
        cache: &mut SignatureCache,
    ) -> Result<SyncPlan, EngineError> {
        let current = TreeSnapshot::build(fs, root)?;
        let mut ops = Vec::new();
        let mut skipped = 0usize;
        for (rel, entry) in current.entries() {
            if entry.is_dir() {
                ops.push(UpdateOp::Add {
                    path: rel.to_owned(),
                    content: None,
                });
                continue;
            }
            let content = fs.read_file(&path::join(root, rel))?;
            cache.record(rel, &content, &self.config);
            let unchanged = self.config.skip_unchanged
                && last_applied.and_then(|tree| tree.fingerprint_of(rel)) == entry.fingerprint();
            if unchanged {
                skipped += 1;
                continue;
            }
            ops.push(UpdateOp::Add {
                path: rel.to_owned(),
                content: Some(content),
            });
        }
        let batch = SyncBatch::full(&current, ops);
        debug!(
            ops = batch.op_count(),
            skipped,
            payload = batch.payload_bytes(),
            "planned full sync"
        );
        Ok(SyncPlan {
            batch,
            next: current,
        })
    }

    /// Plans the incremental batch for one watch event against the snapshot
    /// the target currently mirrors.
    ///
    /// Events are queued, so the affected child may have changed again since
    /// the event fired; the plan is derived from live filesystem state, with
    /// the event only naming the path to look at. An event outside `root`
    /// yields an empty plan.
    pub fn incremental_plan<F: Filesystem + ?Sized>(
        &self,
        fs: &F,
        root: &str,
        prev: &TreeSnapshot,
        event: &WatchEvent,
        cache: &mut SignatureCache,
    ) -> Result<SyncPlan, EngineError> {
        let abs = event.child_path();
        let Some(rel) = path::strip_root(root, &abs) else {
            return Ok(SyncPlan {
                batch: SyncBatch::incremental(Vec::new()),
                next: prev.clone(),
            });
        };
        let rel = rel.to_owned();
        match fs.kind_of(&abs) {
            None => Ok(self.plan_removal(&rel, prev, cache)),
            Some(NodeKind::File) => self.plan_file_upsert(fs, root, &rel, prev, cache),
            Some(NodeKind::Directory) => self.plan_dir_upsert(fs, root, &rel, prev, cache),
        }
    }

    /// Rebuilds a full-content modify op for `rel` after the target refused
    /// a chunk delta, refreshing the cached signature along the way.
    pub fn refresh_full<F: Filesystem + ?Sized>(
        &self,
        fs: &F,
        root: &str,
        rel: &str,
        cache: &mut SignatureCache,
    ) -> Result<(UpdateOp, Entry), EngineError> {
        let content = fs.read_file(&path::join(root, rel))?;
        let entry = Entry::file(Fingerprint::of(&content), content.len() as u64);
        cache.record(rel, &content, &self.config);
        let op = UpdateOp::Modify {
            path: rel.to_owned(),
            delta: ContentDelta::Full(content),
        };
        Ok((op, entry))
    }

    fn plan_removal(&self, rel: &str, prev: &TreeSnapshot, cache: &mut SignatureCache) -> SyncPlan {
        if !prev.contains(rel) {
            return SyncPlan {
                batch: SyncBatch::incremental(Vec::new()),
                next: prev.clone(),
            };
        }
        cache.remove_subtree(rel);
        debug!(path = rel, "planned removal");
        SyncPlan {
            batch: SyncBatch::incremental(vec![UpdateOp::Remove {
                path: rel.to_owned(),
            }]),
            next: prev.without_subtree(rel),
        }
    }

    fn plan_file_upsert<F: Filesystem + ?Sized>(
        &self,
        fs: &F,
        root: &str,
        rel: &str,
        prev: &TreeSnapshot,
        cache: &mut SignatureCache,
    ) -> Result<SyncPlan, EngineError> {
        let content = fs.read_file(&path::join(root, rel))?;
        let fp = Fingerprint::of(&content);
        let next = prev
            .without_subtree(rel)
            .with_entry(rel, Entry::file(fp, content.len() as u64));

        let ops = match prev.get(rel) {
            Some(entry) if entry.is_file() => {
                if self.config.skip_unchanged && entry.fingerprint() == Some(fp) {
                    cache.record(rel, &content, &self.config);
                    return Ok(SyncPlan {
                        batch: SyncBatch::incremental(Vec::new()),
                        next,
                    });
                }
                let delta = self.delta_for(rel, &content, entry.fingerprint(), cache);
                cache.record(rel, &content, &self.config);
                vec![UpdateOp::Modify {
                    path: rel.to_owned(),
                    delta,
                }]
            }
            // A directory made way for a file of the same name.
            Some(_) => {
                cache.remove_subtree(rel);
                cache.record(rel, &content, &self.config);
                vec![
                    UpdateOp::Remove {
                        path: rel.to_owned(),
                    },
                    UpdateOp::Add {
                        path: rel.to_owned(),
                        content: Some(content),
                    },
                ]
            }
            None => {
                cache.record(rel, &content, &self.config);
                vec![UpdateOp::Add {
                    path: rel.to_owned(),
                    content: Some(content),
                }]
            }
        };
        debug!(path = rel, ops = ops.len(), "planned file upsert");
        Ok(SyncPlan {
            batch: SyncBatch::incremental(ops),
            next,
        })
    }

    fn plan_dir_upsert<F: Filesystem + ?Sized>(
        &self,
        fs: &F,
        root: &str,
        rel: &str,
        prev: &TreeSnapshot,
        cache: &mut SignatureCache,
    ) -> Result<SyncPlan, EngineError> {
        let fresh = TreeSnapshot::build_subtree(fs, root, rel)?;
        let mut ops = Vec::new();

        // Stale entries first: paths the previous snapshot holds that the
        // fresh subtree lacks, or holds with a different kind. Only topmost
        // removals are emitted; removing a directory covers its subtree.
        let mut removed: Vec<String> = Vec::new();
        for p in prev.subtree_paths(rel) {
            if removed.iter().any(|r| path::is_strict_ancestor(r, &p)) {
                continue;
            }
            let stale = match (prev.get(&p), fresh.get(&p)) {
                (Some(old), Some(new)) => old.kind() != new.kind(),
                (Some(_), None) => true,
                _ => false,
            };
            if stale {
                ops.push(UpdateOp::Remove { path: p.clone() });
                cache.remove_subtree(&p);
                removed.push(p);
            }
        }
        let gone =
            |p: &str| removed.iter().any(|r| r == p || path::is_strict_ancestor(r, p));

        for (p, entry) in fresh.entries() {
            if entry.is_dir() {
                let already = !gone(p) && prev.get(p).is_some_and(Entry::is_dir);
                if !already {
                    ops.push(UpdateOp::Add {
                        path: p.to_owned(),
                        content: None,
                    });
                }
                continue;
            }
            let survivor = if gone(p) {
                None
            } else {
                prev.get(p).filter(|e| e.is_file())
            };
            let unchanged = self.config.skip_unchanged
                && survivor.is_some_and(|e| e.fingerprint() == entry.fingerprint());
            let content = fs.read_file(&path::join(root, p))?;
            if unchanged {
                cache.record(p, &content, &self.config);
                continue;
            }
            match survivor {
                Some(old) => {
                    let delta = self.delta_for(p, &content, old.fingerprint(), cache);
                    cache.record(p, &content, &self.config);
                    ops.push(UpdateOp::Modify {
                        path: p.to_owned(),
                        delta,
                    });
                }
                None => {
                    cache.record(p, &content, &self.config);
                    ops.push(UpdateOp::Add {
                        path: p.to_owned(),
                        content: Some(content),
                    });
                }
            }
        }

        debug!(path = rel, ops = ops.len(), "planned directory upsert");
        Ok(SyncPlan {
            batch: SyncBatch::incremental(ops),
            next: prev.with_subtree(rel, &fresh),
        })
    }

    /// Chooses how to ship a modified file's content. A chunk delta is only
    /// usable when the cached signature describes exactly the content the
    /// target currently holds.
    fn delta_for(
        &self,
        rel: &str,
        fresh: &[u8],
        prev_fp: Option<Fingerprint>,
        cache: &SignatureCache,
    ) -> ContentDelta {
        if self.config.uses_chunk_delta(fresh.len() as u64) {
            if let (Some(base), Some(sig)) = (prev_fp, cache.get(rel)) {
                if sig.fingerprint() == base {
                    let patches = sig
                        .changed_spans(fresh)
                        .into_iter()
                        .map(|span| {
                            let start = span.offset as usize;
                            ChunkPatch {
                                offset: span.offset,
                                bytes: fresh[start..start + span.len].to_vec(),
                            }
                        })
                        .collect();
                    return ContentDelta::Chunks(ChunkDelta {
                        base,
                        result: Fingerprint::of(fresh),
                        result_len: fresh.len() as u64,
                        patches,
                    });
                }
            }
        }
        ContentDelta::Full(fresh.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs::{ChangeKind, MemoryFs};

    fn source_fs() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.mkdir_p("src/sub").expect("mkdir");
        fs.write_file("src/a.txt", b"alpha").expect("write a");
        fs.write_file("src/sub/b.txt", b"beta").expect("write b");
        fs
    }

    fn added(dir: &str, name: &str) -> WatchEvent {
        WatchEvent {
            dir: dir.into(),
            name: name.into(),
            kind: ChangeKind::Added,
        }
    }

    fn removed(dir: &str, name: &str) -> WatchEvent {
        WatchEvent {
            dir: dir.into(),
            name: name.into(),
            kind: ChangeKind::Removed,
        }
    }

    fn op_paths(batch: &SyncBatch) -> Vec<&str> {
        batch.ops().iter().map(UpdateOp::path).collect()
    }

    #[test]
    fn initial_plan_ships_everything_without_baseline() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();

        let plan = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("plan");
        assert_eq!(op_paths(&plan.batch), ["a.txt", "sub", "sub/b.txt"]);
        plan.batch.check_order().expect("ordered");
        assert_eq!(plan.next.len(), 3);
    }

    #[test]
    fn initial_plan_skips_files_the_baseline_already_holds() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();

        let first = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("first");
        fs.write_file("src/a.txt", b"ALPHA").expect("rewrite");
        let second = engine
            .initial_plan(&fs, "src", Some(&first.next), &mut cache)
            .expect("second");

        // Directory ops always ship; only the changed file does.
        assert_eq!(op_paths(&second.batch), ["a.txt", "sub"]);
    }

    #[test]
    fn new_file_plans_a_single_add() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        fs.write_file("src/sub/c.txt", b"gamma").expect("write");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &added("src/sub", "c.txt"), &mut cache)
            .expect("plan");

        assert_eq!(op_paths(&plan.batch), ["sub/c.txt"]);
        assert!(plan.next.contains("sub/c.txt"));
    }

    #[test]
    fn rewrite_with_identical_content_plans_nothing() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        fs.write_file("src/a.txt", b"alpha").expect("rewrite");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &added("src", "a.txt"), &mut cache)
            .expect("plan");
        assert!(plan.batch.is_empty());
        assert_eq!(plan.next, prev);
    }

    #[test]
    fn removal_collapses_a_subtree_into_one_op() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        fs.remove_dir("src/sub").expect("remove");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &removed("src", "sub"), &mut cache)
            .expect("plan");

        assert_eq!(op_paths(&plan.batch), ["sub"]);
        assert!(matches!(plan.batch.ops()[0], UpdateOp::Remove { .. }));
        assert!(!plan.next.contains("sub"));
        assert!(!plan.next.contains("sub/b.txt"));
    }

    #[test]
    fn event_for_an_unknown_removal_is_a_no_op() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        let plan = engine
            .incremental_plan(&fs, "src", &prev, &removed("src", "ghost"), &mut cache)
            .expect("plan");
        assert!(plan.batch.is_empty());
    }

    #[test]
    fn stale_removed_event_defers_to_live_state() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        // The file was removed and recreated before the event is handled;
        // the plan follows what the tree holds now.
        fs.remove_file("src/a.txt").expect("remove");
        fs.write_file("src/a.txt", b"reborn").expect("recreate");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &removed("src", "a.txt"), &mut cache)
            .expect("plan");

        assert_eq!(op_paths(&plan.batch), ["a.txt"]);
        assert!(matches!(plan.batch.ops()[0], UpdateOp::Modify { .. }));
    }

    #[test]
    fn file_replacing_a_directory_removes_then_adds() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        fs.remove_dir("src/sub").expect("remove dir");
        fs.write_file("src/sub", b"now a file").expect("write file");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &added("src", "sub"), &mut cache)
            .expect("plan");

        assert_eq!(op_paths(&plan.batch), ["sub", "sub"]);
        assert!(matches!(plan.batch.ops()[0], UpdateOp::Remove { .. }));
        assert!(matches!(plan.batch.ops()[1], UpdateOp::Add { .. }));
        plan.batch.check_order().expect("ordered");
    }

    #[test]
    fn moved_in_directory_plans_its_whole_subtree() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        fs.mkdir_p("src/moved/deep").expect("mkdir");
        fs.write_file("src/moved/f.txt", b"f").expect("write f");
        fs.write_file("src/moved/deep/g.txt", b"g").expect("write g");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &added("src", "moved"), &mut cache)
            .expect("plan");

        assert_eq!(
            op_paths(&plan.batch),
            ["moved", "moved/deep", "moved/deep/g.txt", "moved/f.txt"]
        );
        plan.batch.check_order().expect("ordered");
    }

    #[test]
    fn event_outside_the_root_is_ignored() {
        let fs = source_fs();
        fs.mkdir_p("elsewhere").expect("mkdir");
        fs.write_file("elsewhere/x", b"x").expect("write");
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        let plan = engine
            .incremental_plan(&fs, "src", &prev, &added("elsewhere", "x"), &mut cache)
            .expect("plan");
        assert!(plan.batch.is_empty());
        assert_eq!(plan.next, prev);
    }

    #[test]
    fn large_file_edit_ships_chunk_patches() {
        let fs = MemoryFs::new();
        fs.make_dir("src").expect("mkdir");
        let mut content = vec![0u8; 64];
        fs.write_file("src/big.bin", &content).expect("write");

        let engine = DiffEngine::new(SyncConfig {
            large_file_threshold: 32,
            chunk_len: 16,
            ..SyncConfig::default()
        });
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        content[40] = 1;
        fs.write_file("src/big.bin", &content).expect("rewrite");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &added("src", "big.bin"), &mut cache)
            .expect("plan");

        assert_eq!(plan.batch.op_count(), 1);
        match &plan.batch.ops()[0] {
            UpdateOp::Modify {
                delta: ContentDelta::Chunks(delta),
                ..
            } => {
                assert_eq!(delta.result_len, 64);
                assert_eq!(delta.payload_bytes(), 16);
            }
            other => panic!("expected chunk delta, got {other:?}"),
        }
    }

    #[test]
    fn small_file_edit_ships_full_content() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();
        let prev = engine
            .initial_plan(&fs, "src", None, &mut cache)
            .expect("seed")
            .next;

        fs.write_file("src/a.txt", b"edited").expect("rewrite");
        let plan = engine
            .incremental_plan(&fs, "src", &prev, &added("src", "a.txt"), &mut cache)
            .expect("plan");

        assert!(matches!(
            plan.batch.ops()[0],
            UpdateOp::Modify {
                delta: ContentDelta::Full(_),
                ..
            }
        ));
    }

    #[test]
    fn refresh_full_rebuilds_a_full_content_op() {
        let fs = source_fs();
        let engine = DiffEngine::default();
        let mut cache = SignatureCache::new();

        let (op, entry) = engine
            .refresh_full(&fs, "src", "a.txt", &mut cache)
            .expect("refresh");
        assert!(entry.is_file());
        assert!(matches!(
            op,
            UpdateOp::Modify {
                delta: ContentDelta::Full(_),
                ..
            }
        ));
    }
}
