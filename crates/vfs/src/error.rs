use std::error::Error;
use std::fmt;
use std::io;

/// Error returned when a filesystem capability operation fails.
#[derive(Debug)]
pub struct FsError {
    kind: FsErrorKind,
}

impl FsError {
    fn new(kind: FsErrorKind) -> Self {
        Self { kind }
    }

    /// Builds a "path does not exist" error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(FsErrorKind::NotFound { path: path.into() })
    }

    /// Builds an error for a file operation that addressed a directory.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::new(FsErrorKind::NotAFile { path: path.into() })
    }

    /// Builds an error for a directory operation that addressed a file.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::new(FsErrorKind::NotADirectory { path: path.into() })
    }

    /// Builds an error for an operation whose parent directory is absent.
    pub fn missing_parent(path: impl Into<String>) -> Self {
        Self::new(FsErrorKind::MissingParent { path: path.into() })
    }

    /// Builds an error for a path that is not a normalized relative path.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::new(FsErrorKind::InvalidPath { path: path.into() })
    }

    /// Wraps an operating-system failure with the path it occurred on.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::new(FsErrorKind::Io {
            path: path.into(),
            source,
        })
    }

    /// Returns the specific failure classification.
    #[must_use]
    pub fn kind(&self) -> &FsErrorKind {
        &self.kind
    }

    /// Returns the path the failing operation addressed.
    #[must_use]
    pub fn path(&self) -> &str {
        match &self.kind {
            FsErrorKind::NotFound { path }
            | FsErrorKind::NotAFile { path }
            | FsErrorKind::NotADirectory { path }
            | FsErrorKind::MissingParent { path }
            | FsErrorKind::InvalidPath { path }
            | FsErrorKind::Io { path, .. } => path,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FsErrorKind::NotFound { path } => write!(f, "no such file or directory: '{path}'"),
            FsErrorKind::NotAFile { path } => write!(f, "not a regular file: '{path}'"),
            FsErrorKind::NotADirectory { path } => write!(f, "not a directory: '{path}'"),
            FsErrorKind::MissingParent { path } => {
                write!(f, "parent directory does not exist for '{path}'")
            }
            FsErrorKind::InvalidPath { path } => {
                write!(f, "invalid capability path: '{path}'")
            }
            FsErrorKind::Io { path, source } => {
                write!(f, "i/o failure on '{path}': {source}")
            }
        }
    }
}

impl Error for FsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            FsErrorKind::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Classification of filesystem capability failures.
#[derive(Debug)]
pub enum FsErrorKind {
    /// The addressed path does not exist.
    NotFound {
        /// Path that failed to resolve.
        path: String,
    },
    /// A file operation addressed a directory.
    NotAFile {
        /// Path occupied by a directory.
        path: String,
    },
    /// A directory operation addressed a file.
    NotADirectory {
        /// Path occupied by a regular file.
        path: String,
    },
    /// The parent directory of the addressed path does not exist.
    MissingParent {
        /// Path whose parent is absent.
        path: String,
    },
    /// The path is not a normalized relative capability path.
    InvalidPath {
        /// Offending path text.
        path: String,
    },
    /// The underlying operating system reported a failure.
    Io {
        /// Path the failing operation addressed.
        path: String,
        /// Underlying error emitted by the operating system.
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path() {
        let err = FsError::not_found("a/b.txt");
        assert_eq!(err.to_string(), "no such file or directory: 'a/b.txt'");
        assert_eq!(err.path(), "a/b.txt");
    }

    #[test]
    fn io_errors_expose_source() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = FsError::io("f", io);
        assert!(err.source().is_some());
        assert!(matches!(err.kind(), FsErrorKind::Io { .. }));
    }
}
