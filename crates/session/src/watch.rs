use crossbeam_channel::Sender;
use rustc_hash::FxHashMap;
use snapshot::TreeSnapshot;
use tracing::warn;
use vfs::{WatchCapability, WatchEvent, WatchHandle, path};

/// Keeps the set of watched directories equal to the set of directories in
/// the last-applied snapshot, plus the root itself.
///
/// Reconciliation is additive and subtractive only; an already-registered
/// directory is left alone, so its handle stays stable across syncs. A
/// single registration failure is logged and skipped rather than aborting
/// the sync that triggered it, and the next reconcile retries it.
pub struct WatchManager {
    root: String,
    handles: FxHashMap<String, WatchHandle>,
}

impl WatchManager {
    /// Creates a manager for the source subtree at `root`.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            handles: FxHashMap::default(),
        }
    }

    /// Aligns live registrations with the directories of `tree`, delivering
    /// events into `sender`.
    pub fn reconcile<F: WatchCapability + ?Sized>(
        &mut self,
        fs: &F,
        tree: &TreeSnapshot,
        sender: &Sender<WatchEvent>,
    ) {
        let mut desired: Vec<String> = vec![self.root.clone()];
        desired.extend(tree.directories().map(|dir| path::join(&self.root, dir)));

        self.handles.retain(|dir, _| {
            if desired.iter().any(|d| d == dir) {
                return true;
            }
            if let Err(err) = fs.unwatch(dir) {
                warn!(dir = %dir, %err, "unwatch failed");
            }
            false
        });

        for dir in desired {
            if self.handles.contains_key(&dir) {
                continue;
            }
            let tx = sender.clone();
            match fs.watch(&dir, Box::new(move |event| drop(tx.send(event)))) {
                Ok(handle) => {
                    self.handles.insert(dir, handle);
                }
                Err(err) => warn!(dir = %dir, %err, "watch failed"),
            }
        }
    }

    /// Deregisters everything the manager holds.
    pub fn clear<F: WatchCapability + ?Sized>(&mut self, fs: &F) {
        for dir in self.handles.keys() {
            if let Err(err) = fs.unwatch(dir) {
                warn!(dir = %dir, %err, "unwatch failed");
            }
        }
        self.handles.clear();
    }

    /// Directories currently registered.
    pub fn watched(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Reports whether no directory is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
