use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use crate::path;
use crate::watch::{ChangeKind, WatchCallback, WatchCapability, WatchEvent, WatchHandle};
use crate::{Filesystem, FsError, NodeKind};

#[derive(Clone, Debug)]
enum Node {
    File(Vec<u8>),
    Dir,
}

struct Registration {
    handle: WatchHandle,
    // Taken out while its callback runs so delivery never holds the state
    // borrow across user code.
    callback: Option<WatchCallback>,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    watches: HashMap<String, Registration>,
    next_handle: u64,
    pending: VecDeque<WatchEvent>,
    delivering: bool,
    write_counts: BTreeMap<String, u64>,
}

/// Deterministic in-memory filesystem with synchronous watch delivery.
///
/// Cloning yields another handle onto the same tree, letting a source reader
/// and a target writer share state in loopback tests. The root (the empty
/// path) always exists and cannot be removed.
///
/// Every successful `write_file` increments a per-path counter, so tests can
/// assert that the replication engine skipped a redundant write rather than
/// merely observing identical content afterwards.
#[derive(Clone)]
pub struct MemoryFs {
    inner: Rc<RefCell<State>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Creates an empty filesystem containing only the root directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(State::default())),
        }
    }

    /// Creates `dir` and any missing ancestors. Test-setup convenience; the
    /// replication engine itself only uses strict [`Filesystem::make_dir`].
    pub fn mkdir_p(&self, dir: &str) -> Result<(), FsError> {
        path::validate(dir)?;
        if dir.is_empty() {
            return Ok(());
        }
        let mut built = String::new();
        for component in dir.split('/') {
            built = path::join(&built, component);
            self.make_dir(&built)?;
        }
        Ok(())
    }

    /// Number of successful `write_file` calls that addressed `path`.
    #[must_use]
    pub fn file_write_count(&self, path: &str) -> u64 {
        self.inner
            .borrow()
            .write_counts
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of successful `write_file` calls across all paths.
    #[must_use]
    pub fn total_file_writes(&self) -> u64 {
        self.inner.borrow().write_counts.values().sum()
    }

    fn queue_child_event(&self, child_path: &str, kind: ChangeKind) {
        let Some(dir) = path::parent(child_path) else {
            return;
        };
        let mut st = self.inner.borrow_mut();
        if st.watches.contains_key(dir) {
            st.pending.push_back(WatchEvent {
                dir: dir.to_owned(),
                name: path::file_name(child_path).to_owned(),
                kind,
            });
        }
    }

    // Drains queued events, invoking each callback with the state borrow
    // released. Mutations performed by a callback queue further events that
    // the same loop picks up; re-entrant dispatch is a no-op.
    fn dispatch(&self) {
        {
            let mut st = self.inner.borrow_mut();
            if st.delivering {
                return;
            }
            st.delivering = true;
        }
        loop {
            let next = {
                let mut st = self.inner.borrow_mut();
                let Some(event) = st.pending.pop_front() else {
                    st.delivering = false;
                    return;
                };
                st.watches
                    .get_mut(&event.dir)
                    .and_then(|reg| reg.callback.take().map(|cb| (cb, reg.handle)))
                    .map(|(cb, handle)| (event, cb, handle))
            };
            if let Some((event, mut callback, handle)) = next {
                let dir = event.dir.clone();
                callback(event);
                let mut st = self.inner.borrow_mut();
                if let Some(reg) = st.watches.get_mut(&dir) {
                    if reg.handle == handle && reg.callback.is_none() {
                        reg.callback = Some(callback);
                    }
                }
            }
        }
    }

    fn check_parent(st: &State, child: &str) -> Result<(), FsError> {
        let Some(parent) = path::parent(child) else {
            return Err(FsError::invalid_path(child));
        };
        if parent.is_empty() {
            return Ok(());
        }
        match st.nodes.get(parent) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(FsError::not_a_directory(parent)),
            None => Err(FsError::missing_parent(child)),
        }
    }
}

impl Filesystem for MemoryFs {
    fn kind_of(&self, path: &str) -> Option<NodeKind> {
        if path::validate(path).is_err() {
            return None;
        }
        if path.is_empty() {
            return Some(NodeKind::Directory);
        }
        match self.inner.borrow().nodes.get(path) {
            Some(Node::File(_)) => Some(NodeKind::File),
            Some(Node::Dir) => Some(NodeKind::Directory),
            None => None,
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        path::validate(path)?;
        match self.inner.borrow().nodes.get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir) => Err(FsError::not_a_file(path)),
            None => Err(FsError::not_found(path)),
        }
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        path::validate(path)?;
        if path.is_empty() {
            return Err(FsError::invalid_path(path));
        }
        {
            let mut st = self.inner.borrow_mut();
            Self::check_parent(&st, path)?;
            if matches!(st.nodes.get(path), Some(Node::Dir)) {
                return Err(FsError::not_a_file(path));
            }
            st.nodes.insert(path.to_owned(), Node::File(content.to_vec()));
            *st.write_counts.entry(path.to_owned()).or_insert(0) += 1;
        }
        // Rewrites surface as Added; the watch primitive has no distinct
        // "modified" kind and consumers detect content changes by
        // fingerprint.
        self.queue_child_event(path, ChangeKind::Added);
        self.dispatch();
        Ok(())
    }

    fn make_dir(&self, path: &str) -> Result<(), FsError> {
        path::validate(path)?;
        if path.is_empty() {
            return Ok(());
        }
        let created = {
            let mut st = self.inner.borrow_mut();
            match st.nodes.get(path) {
                Some(Node::Dir) => false,
                Some(Node::File(_)) => return Err(FsError::not_a_directory(path)),
                None => {
                    Self::check_parent(&st, path)?;
                    st.nodes.insert(path.to_owned(), Node::Dir);
                    true
                }
            }
        };
        if created {
            self.queue_child_event(path, ChangeKind::Added);
            self.dispatch();
        }
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), FsError> {
        path::validate(path)?;
        {
            let mut st = self.inner.borrow_mut();
            match st.nodes.get(path) {
                Some(Node::File(_)) => {
                    st.nodes.remove(path);
                }
                Some(Node::Dir) => return Err(FsError::not_a_file(path)),
                None => return Err(FsError::not_found(path)),
            }
        }
        self.queue_child_event(path, ChangeKind::Removed);
        self.dispatch();
        Ok(())
    }

    fn remove_dir(&self, path: &str) -> Result<(), FsError> {
        path::validate(path)?;
        if path.is_empty() {
            return Err(FsError::invalid_path(path));
        }
        {
            let mut st = self.inner.borrow_mut();
            match st.nodes.get(path) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(FsError::not_a_directory(path)),
                None => return Err(FsError::not_found(path)),
            }
            let prefix = format!("{path}/");
            let mut doomed: Vec<String> = vec![path.to_owned()];
            doomed.extend(
                st.nodes
                    .range(prefix.clone()..)
                    .take_while(|(p, _)| p.starts_with(&prefix))
                    .map(|(p, _)| p.clone()),
            );
            for p in &doomed {
                st.nodes.remove(p);
                // Registrations inside the removed subtree would be dangling.
                st.watches.remove(p);
            }
        }
        self.queue_child_event(path, ChangeKind::Removed);
        self.dispatch();
        Ok(())
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, FsError> {
        path::validate(path)?;
        let st = self.inner.borrow();
        if !path.is_empty() {
            match st.nodes.get(path) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(FsError::not_a_directory(path)),
                None => return Err(FsError::not_found(path)),
            }
        }
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let children = st
            .nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| path::parent(p) == Some(path))
            .map(|(p, _)| path::file_name(p).to_owned())
            .collect();
        Ok(children)
    }
}

impl WatchCapability for MemoryFs {
    fn watch(&self, dir: &str, callback: WatchCallback) -> Result<WatchHandle, FsError> {
        path::validate(dir)?;
        if !self.is_dir(dir) {
            return Err(FsError::not_found(dir));
        }
        let mut st = self.inner.borrow_mut();
        if let Some(existing) = st.watches.get(dir) {
            return Ok(existing.handle);
        }
        st.next_handle += 1;
        let handle = WatchHandle(st.next_handle);
        st.watches.insert(
            dir.to_owned(),
            Registration {
                handle,
                callback: Some(callback),
            },
        );
        Ok(handle)
    }

    fn unwatch(&self, dir: &str) -> Result<(), FsError> {
        path::validate(dir)?;
        self.inner.borrow_mut().watches.remove(dir);
        Ok(())
    }

    fn watch_handle(&self, dir: &str) -> Option<WatchHandle> {
        self.inner.borrow().watches.get(dir).map(|reg| reg.handle)
    }
}
