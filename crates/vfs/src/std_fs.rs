use std::fs;
use std::io;
use std::path::PathBuf;

use crate::{Filesystem, FsError, NodeKind, path};

/// Adapter exposing a real directory tree through the [`Filesystem`]
/// capability set.
///
/// Capability paths resolve beneath the configured base directory; the
/// validation in [`path::validate`] guarantees resolved paths cannot escape
/// it. Change notification is not provided here, it remains an external
/// collaborator wired in by the embedding process.
#[derive(Clone, Debug)]
pub struct StdFilesystem {
    base: PathBuf,
}

impl StdFilesystem {
    /// Creates an adapter rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Returns the base directory the adapter resolves against.
    #[must_use]
    pub fn base(&self) -> &std::path::Path {
        &self.base
    }

    fn resolve(&self, capability_path: &str) -> Result<PathBuf, FsError> {
        path::validate(capability_path)?;
        let mut resolved = self.base.clone();
        for component in capability_path.split('/').filter(|c| !c.is_empty()) {
            resolved.push(component);
        }
        Ok(resolved)
    }
}

impl Filesystem for StdFilesystem {
    fn kind_of(&self, path: &str) -> Option<NodeKind> {
        let resolved = self.resolve(path).ok()?;
        let metadata = fs::symlink_metadata(resolved).ok()?;
        if metadata.is_dir() {
            Some(NodeKind::Directory)
        } else if metadata.is_file() {
            Some(NodeKind::File)
        } else {
            None
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let resolved = self.resolve(path)?;
        match self.kind_of(path) {
            Some(NodeKind::File) => {}
            Some(NodeKind::Directory) => return Err(FsError::not_a_file(path)),
            None => return Err(FsError::not_found(path)),
        }
        fs::read(resolved).map_err(|error| FsError::io(path, error))
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let resolved = self.resolve(path)?;
        if path.is_empty() || self.is_dir(path) {
            return Err(FsError::not_a_file(path));
        }
        match fs::write(resolved, content) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                Err(FsError::missing_parent(path))
            }
            Err(error) => Err(FsError::io(path, error)),
        }
    }

    fn make_dir(&self, path: &str) -> Result<(), FsError> {
        let resolved = self.resolve(path)?;
        match self.kind_of(path) {
            Some(NodeKind::Directory) => return Ok(()),
            Some(NodeKind::File) => return Err(FsError::not_a_directory(path)),
            None => {}
        }
        match fs::create_dir(resolved) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                Err(FsError::missing_parent(path))
            }
            Err(error) => Err(FsError::io(path, error)),
        }
    }

    fn remove_file(&self, path: &str) -> Result<(), FsError> {
        let resolved = self.resolve(path)?;
        match self.kind_of(path) {
            Some(NodeKind::File) => {}
            Some(NodeKind::Directory) => return Err(FsError::not_a_file(path)),
            None => return Err(FsError::not_found(path)),
        }
        fs::remove_file(resolved).map_err(|error| FsError::io(path, error))
    }

    fn remove_dir(&self, path: &str) -> Result<(), FsError> {
        let resolved = self.resolve(path)?;
        match self.kind_of(path) {
            Some(NodeKind::Directory) => {}
            Some(NodeKind::File) => return Err(FsError::not_a_directory(path)),
            None => return Err(FsError::not_found(path)),
        }
        fs::remove_dir_all(resolved).map_err(|error| FsError::io(path, error))
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, FsError> {
        let resolved = self.resolve(path)?;
        match self.kind_of(path) {
            Some(NodeKind::Directory) => {}
            Some(NodeKind::File) => return Err(FsError::not_a_directory(path)),
            None => return Err(FsError::not_found(path)),
        }
        let read_dir = fs::read_dir(resolved).map_err(|error| FsError::io(path, error))?;
        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|error| FsError::io(path, error))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_real_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fs = StdFilesystem::new(temp.path());

        fs.make_dir("d").expect("mkdir");
        fs.write_file("d/f.txt", b"content").expect("write");
        assert_eq!(fs.read_file("d/f.txt").expect("read"), b"content");
        assert_eq!(fs.list_children("d").expect("list"), ["f.txt"]);
        assert_eq!(fs.kind_of("d"), Some(NodeKind::Directory));

        fs.remove_dir("d").expect("remove");
        assert!(!fs.exists("d"));
    }

    #[test]
    fn listing_is_sorted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fs = StdFilesystem::new(temp.path());
        fs.write_file("b.txt", b"").expect("write b");
        fs.write_file("a.txt", b"").expect("write a");
        assert_eq!(fs.list_children("").expect("list"), ["a.txt", "b.txt"]);
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fs = StdFilesystem::new(temp.path());
        assert!(fs.read_file("../outside").is_err());
        assert!(fs.write_file("/abs", b"").is_err());
    }

    #[test]
    fn make_dir_without_parent_reports_missing_parent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fs = StdFilesystem::new(temp.path());
        let err = fs.make_dir("a/b").expect_err("missing parent");
        assert!(matches!(
            err.kind(),
            crate::FsErrorKind::MissingParent { .. }
        ));
    }
}
