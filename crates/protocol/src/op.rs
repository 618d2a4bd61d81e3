use checksums::Fingerprint;
use serde::{Deserialize, Serialize};

/// One patched region of a chunk delta.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChunkPatch {
    /// Byte offset of the patch within the resulting content.
    pub offset: u64,
    /// Replacement bytes written at `offset`.
    pub bytes: Vec<u8>,
}

/// Chunk-level patch set against a previously replicated file content.
///
/// The target starts from its current content, which must fingerprint to
/// `base`, resizes it to `result_len`, overwrites each patch at its offset,
/// and verifies the outcome against `result`. Any fingerprint mismatch is
/// content drift; the target must refuse to apply rather than risk silently
/// corrupting the file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Fingerprint of the content the patches were computed against.
    pub base: Fingerprint,
    /// Fingerprint the patched content must hash to.
    pub result: Fingerprint,
    /// Length in bytes of the patched content.
    pub result_len: u64,
    /// Patched regions, in ascending offset order.
    pub patches: Vec<ChunkPatch>,
}

impl ChunkDelta {
    /// Total number of payload bytes the delta carries.
    #[must_use]
    pub fn payload_bytes(&self) -> u64 {
        self.patches.iter().map(|p| p.bytes.len() as u64).sum()
    }
}

/// Replacement content for a modified file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContentDelta {
    /// Complete file content.
    Full(Vec<u8>),
    /// Chunk-level patches against the last replicated content.
    Chunks(ChunkDelta),
}

impl ContentDelta {
    /// Number of payload bytes the delta carries.
    #[must_use]
    pub fn payload_bytes(&self) -> u64 {
        match self {
            Self::Full(content) => content.len() as u64,
            Self::Chunks(delta) => delta.payload_bytes(),
        }
    }
}

/// One update applied to the target tree.
///
/// Produced by the diff engine once per sync cycle, consumed exactly once by
/// the applier, never persisted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum UpdateOp {
    /// Create a directory (`content` absent) or a file (`content` present)
    /// at `path`; batch ordering guarantees the parent already exists.
    Add {
        /// Root-relative path being created.
        path: String,
        /// File content; `None` creates a directory.
        content: Option<Vec<u8>>,
    },
    /// Delete the file at `path`, or the directory at `path` together with
    /// its entire subtree. Removing an absent path is not an error.
    Remove {
        /// Root-relative path being removed.
        path: String,
    },
    /// Replace or patch the content of the existing file at `path`.
    Modify {
        /// Root-relative path being rewritten.
        path: String,
        /// Full replacement or chunk-level patches.
        delta: ContentDelta,
    },
}

impl UpdateOp {
    /// Root-relative path the op addresses.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Modify { path, .. } => path,
        }
    }

    /// Returns `true` for an op that creates a directory.
    #[must_use]
    pub fn creates_directory(&self) -> bool {
        matches!(self, Self::Add { content: None, .. })
    }

    /// Number of payload bytes the op carries over the wire.
    #[must_use]
    pub fn payload_bytes(&self) -> u64 {
        match self {
            Self::Add { content, .. } => {
                content.as_ref().map_or(0, |bytes| bytes.len() as u64)
            }
            Self::Remove { .. } => 0,
            Self::Modify { delta, .. } => delta.payload_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accounts_for_content_and_patches() {
        let add = UpdateOp::Add {
            path: "f".into(),
            content: Some(vec![0; 10]),
        };
        assert_eq!(add.payload_bytes(), 10);

        let dir = UpdateOp::Add {
            path: "d".into(),
            content: None,
        };
        assert_eq!(dir.payload_bytes(), 0);
        assert!(dir.creates_directory());

        let modify = UpdateOp::Modify {
            path: "f".into(),
            delta: ContentDelta::Chunks(ChunkDelta {
                base: checksums::Fingerprint::of(b"old"),
                result: checksums::Fingerprint::of(b"new"),
                result_len: 3,
                patches: vec![
                    ChunkPatch {
                        offset: 0,
                        bytes: vec![1, 2],
                    },
                    ChunkPatch {
                        offset: 2,
                        bytes: vec![3],
                    },
                ],
            }),
        };
        assert_eq!(modify.payload_bytes(), 3);
    }

    #[test]
    fn ops_round_trip_through_serde() {
        let op = UpdateOp::Modify {
            path: "a/b.bin".into(),
            delta: ContentDelta::Full(vec![1, 2, 3]),
        };
        let json = serde_json::to_string(&op).expect("serialize");
        let back: UpdateOp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, op);
    }
}
