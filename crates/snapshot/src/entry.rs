use checksums::Fingerprint;
use serde::{Deserialize, Serialize};

/// Kind of filesystem object an entry describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file with byte content.
    File,
    /// Directory; existence only, no content identity.
    Directory,
}

/// One filesystem object relative to a replication root.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Entry {
    kind: EntryKind,
    fingerprint: Option<Fingerprint>,
    size: u64,
}

impl Entry {
    /// Creates a file entry from its content identity.
    #[must_use]
    pub const fn file(fingerprint: Fingerprint, size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            fingerprint: Some(fingerprint),
            size,
        }
    }

    /// Creates a directory entry.
    #[must_use]
    pub const fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            fingerprint: None,
            size: 0,
        }
    }

    /// Kind of the underlying filesystem object.
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Content fingerprint; `None` for directories.
    #[must_use]
    pub const fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    /// Content length in bytes; zero for directories.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` for file entries.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Returns `true` for directory entries.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entries_carry_identity() {
        let fp = Fingerprint::of(b"content");
        let entry = Entry::file(fp, 7);
        assert!(entry.is_file());
        assert_eq!(entry.fingerprint(), Some(fp));
        assert_eq!(entry.size(), 7);
    }

    #[test]
    fn directory_entries_have_no_fingerprint() {
        let entry = Entry::directory();
        assert!(entry.is_dir());
        assert_eq!(entry.fingerprint(), None);
        assert_eq!(entry.size(), 0);
    }
}
