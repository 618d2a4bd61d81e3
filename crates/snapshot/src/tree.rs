use std::collections::BTreeMap;

use checksums::Fingerprint;
use vfs::{Filesystem, FsError, NodeKind, path};

use crate::entry::{Entry, EntryKind};

/// Immutable mapping from root-relative path to [`Entry`].
///
/// Iteration order is lexicographic, which places every directory before all
/// of its descendants; consumers that need a parent-before-child (pre-order)
/// sequence can therefore iterate [`TreeSnapshot::entries`] directly.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TreeSnapshot {
    entries: BTreeMap<String, Entry>,
}

impl TreeSnapshot {
    /// Snapshot of an empty tree.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot by fully enumerating the subtree rooted at `root`.
    ///
    /// All-or-nothing: any traversal failure discards partial results and
    /// surfaces the underlying [`FsError`]. Fails when `root` is missing or
    /// not a directory.
    pub fn build<F: Filesystem + ?Sized>(fs: &F, root: &str) -> Result<Self, FsError> {
        match fs.kind_of(root) {
            Some(NodeKind::Directory) => {}
            Some(NodeKind::File) => return Err(FsError::not_a_directory(root)),
            None => return Err(FsError::not_found(root)),
        }
        let mut entries = BTreeMap::new();
        walk_into(fs, root, "", &mut entries)?;
        Ok(Self { entries })
    }

    /// Builds a snapshot covering only the subtree at `sub` (relative to
    /// `root`), with entries still keyed relative to `root`.
    ///
    /// Returns an empty snapshot when nothing exists at `sub`; the caller
    /// distinguishes "absent" from "empty directory" via [`Self::contains`]
    /// on the result.
    pub fn build_subtree<F: Filesystem + ?Sized>(
        fs: &F,
        root: &str,
        sub: &str,
    ) -> Result<Self, FsError> {
        if sub.is_empty() {
            return Self::build(fs, root);
        }
        let abs = path::join(root, sub);
        let mut entries = BTreeMap::new();
        match fs.kind_of(&abs) {
            None => {}
            Some(NodeKind::File) => {
                let content = fs.read_file(&abs)?;
                entries.insert(
                    sub.to_owned(),
                    Entry::file(Fingerprint::of(&content), content.len() as u64),
                );
            }
            Some(NodeKind::Directory) => {
                entries.insert(sub.to_owned(), Entry::directory());
                walk_into(fs, root, sub, &mut entries)?;
            }
        }
        Ok(Self { entries })
    }

    /// Looks up the entry recorded for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Reports whether `path` is present in the snapshot.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Content fingerprint of the file at `path`; `None` for directories and
    /// absent paths.
    #[must_use]
    pub fn fingerprint_of(&self, path: &str) -> Option<Fingerprint> {
        self.entries.get(path).and_then(Entry::fingerprint)
    }

    /// Iterates entries in lexicographic (parent-before-child) order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(p, e)| (p.as_str(), e))
    }

    /// Iterates the directory paths recorded in the snapshot.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_dir())
            .map(|(p, _)| p.as_str())
    }

    /// Number of entries in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the snapshot records no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths at or beneath `sub`, in lexicographic order.
    #[must_use]
    pub fn subtree_paths(&self, sub: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|p| p.as_str() == sub || path::is_strict_ancestor(sub, p))
            .cloned()
            .collect()
    }

    /// Returns a new snapshot with `entry` recorded at `path`.
    #[must_use]
    pub fn with_entry(&self, path: &str, entry: Entry) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(path.to_owned(), entry);
        Self { entries }
    }

    /// Returns a new snapshot without `sub` and everything beneath it.
    #[must_use]
    pub fn without_subtree(&self, sub: &str) -> Self {
        let mut entries = self.entries.clone();
        entries.retain(|p, _| p != sub && !path::is_strict_ancestor(sub, p));
        Self { entries }
    }

    /// Returns a new snapshot where the subtree at `sub` is replaced by the
    /// entries of `fresh` (already keyed relative to the same root).
    #[must_use]
    pub fn with_subtree(&self, sub: &str, fresh: &Self) -> Self {
        let mut entries = self.entries.clone();
        entries.retain(|p, _| p != sub && !path::is_strict_ancestor(sub, p));
        for (p, e) in &fresh.entries {
            entries.insert(p.clone(), *e);
        }
        Self { entries }
    }

    /// Compares this snapshot against a `baseline` of the same root.
    ///
    /// Added paths exist only here, removed paths only in the baseline, and
    /// changed paths exist in both with a differing kind or fingerprint.
    #[must_use]
    pub fn diff_against(&self, baseline: &Self) -> TreeDiff {
        let mut diff = TreeDiff::default();
        for (path, entry) in &self.entries {
            match baseline.entries.get(path) {
                None => diff.added.push(path.clone()),
                Some(old) => {
                    let same = old.kind() == entry.kind()
                        && (entry.kind() == EntryKind::Directory
                            || old.fingerprint() == entry.fingerprint());
                    if !same {
                        diff.changed.push(path.clone());
                    }
                }
            }
        }
        for path in baseline.entries.keys() {
            if !self.entries.contains_key(path) {
                diff.removed.push(path.clone());
            }
        }
        diff
    }
}

fn walk_into<F: Filesystem + ?Sized>(
    fs: &F,
    root: &str,
    start: &str,
    entries: &mut BTreeMap<String, Entry>,
) -> Result<(), FsError> {
    let mut stack = vec![start.to_owned()];
    while let Some(rel_dir) = stack.pop() {
        let abs_dir = path::join(root, &rel_dir);
        for name in fs.list_children(&abs_dir)? {
            let rel = path::join(&rel_dir, &name);
            let abs = path::join(root, &rel);
            match fs.kind_of(&abs) {
                Some(NodeKind::Directory) => {
                    entries.insert(rel.clone(), Entry::directory());
                    stack.push(rel);
                }
                Some(NodeKind::File) => {
                    let content = fs.read_file(&abs)?;
                    entries.insert(rel, Entry::file(Fingerprint::of(&content), content.len() as u64));
                }
                // Listed a moment ago but gone now; the single-writer
                // precondition was violated, so refuse a partial snapshot.
                None => return Err(FsError::not_found(abs)),
            }
        }
    }
    Ok(())
}

/// Result of comparing two snapshots of the same root.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TreeDiff {
    /// Paths present only in the newer snapshot.
    pub added: Vec<String>,
    /// Paths present only in the baseline snapshot.
    pub removed: Vec<String>,
    /// Paths present in both with a differing kind or fingerprint.
    pub changed: Vec<String>,
}

impl TreeDiff {
    /// Reports whether the two snapshots were identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
