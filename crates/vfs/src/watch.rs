use crate::FsError;

/// Kind of change observed inside a watched directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    /// An immediate child appeared or was rewritten in place.
    Added,
    /// An immediate child disappeared; files and subtrees collapse to one
    /// kind, the consumer re-derives the type from its prior state.
    Removed,
}

/// Immediate-child change event delivered to a watch callback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WatchEvent {
    /// Watched directory the change occurred in.
    pub dir: String,
    /// Name of the affected immediate child.
    pub name: String,
    /// Whether the child appeared or disappeared.
    pub kind: ChangeKind,
}

impl WatchEvent {
    /// Full path of the affected child.
    #[must_use]
    pub fn child_path(&self) -> String {
        crate::path::join(&self.dir, &self.name)
    }
}

/// Opaque identity of one watch registration.
///
/// Handles are never reused: re-watching a directory after an unwatch yields
/// a handle distinct from any stale one, so leaked registrations are
/// detectable in tests.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct WatchHandle(pub(crate) u64);

impl WatchHandle {
    /// Raw identity value, exposed for diagnostics.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Callback invoked for every change inside a watched directory.
pub type WatchCallback = Box<dyn FnMut(WatchEvent)>;

/// Change-notification capability.
///
/// Both operations are idempotent: watching an already-watched directory
/// returns the existing registration's handle, and unwatching an unwatched
/// path succeeds without effect.
pub trait WatchCapability {
    /// Registers `callback` for immediate-child changes beneath `dir`.
    fn watch(&self, dir: &str, callback: WatchCallback) -> Result<WatchHandle, FsError>;

    /// Deregisters any callback registered for `dir`.
    fn unwatch(&self, dir: &str) -> Result<(), FsError>;

    /// Returns the handle currently registered for `dir`, if any.
    fn watch_handle(&self, dir: &str) -> Option<WatchHandle>;
}
