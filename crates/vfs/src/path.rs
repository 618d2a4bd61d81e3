//! Relative-path helpers shared by the capability implementations and the
//! replication engine.
//!
//! Capability paths are slash-separated, relative, and normalized: no leading
//! or trailing separators, no empty components, no `.` or `..`. The empty
//! string names the capability root.

use crate::FsError;

/// Validates that `path` is a normalized relative capability path.
///
/// The empty string (the root) is accepted.
pub fn validate(path: &str) -> Result<(), FsError> {
    if path.is_empty() {
        return Ok(());
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(FsError::invalid_path(path));
    }
    for component in path.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(FsError::invalid_path(path));
        }
    }
    Ok(())
}

/// Joins `base` and `name` with a single separator.
///
/// An empty `base` (the root) yields `name` unchanged, keeping joined paths
/// free of leading separators.
#[must_use]
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else if name.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{name}")
    }
}

/// Returns the parent of `path`, or `None` for the root.
///
/// The parent of a single-component path is the root (the empty string).
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rfind('/').map_or("", |idx| &path[..idx]))
}

/// Returns the final component of `path`; the root has an empty name.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rfind('/').map_or(path, |idx| &path[idx + 1..])
}

/// Reports whether `candidate` lies strictly beneath `ancestor`.
///
/// The root is an ancestor of every non-root path. A path is not its own
/// ancestor.
#[must_use]
pub fn is_strict_ancestor(ancestor: &str, candidate: &str) -> bool {
    if candidate.is_empty() || ancestor == candidate {
        return false;
    }
    if ancestor.is_empty() {
        return true;
    }
    candidate.len() > ancestor.len()
        && candidate.starts_with(ancestor)
        && candidate.as_bytes()[ancestor.len()] == b'/'
}

/// Strips `root` from the front of `path`, yielding a root-relative path.
///
/// Returns `None` when `path` does not lie at or beneath `root`.
#[must_use]
pub fn strip_root<'a>(root: &str, path: &'a str) -> Option<&'a str> {
    if root.is_empty() {
        return Some(path);
    }
    if path == root {
        return Some("");
    }
    if is_strict_ancestor(root, path) {
        Some(&path[root.len() + 1..])
    } else {
        None
    }
}
