use xxhash_rust::xxh3::xxh3_64;

use crate::fingerprint::Fingerprint;
use crate::rolling::RollingChecksum;

/// Default chunk length used when signing file content.
pub const DEFAULT_CHUNK_LEN: usize = 64 * 1024;

/// Per-chunk signature: weak checksum, strong digest, and exact length.
///
/// Two chunks are considered equal only when all three components match; the
/// strong digest confirms the weak checksum so a 32-bit collision can never
/// mark a changed chunk as unchanged.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkSignature {
    weak: u32,
    strong: u64,
    len: usize,
}

impl ChunkSignature {
    fn of(chunk: &[u8]) -> Self {
        Self {
            weak: RollingChecksum::of(chunk).value(),
            strong: xxh3_64(chunk),
            len: chunk.len(),
        }
    }

    /// Weak checksum in packed 32-bit form.
    #[must_use]
    pub const fn weak(&self) -> u32 {
        self.weak
    }

    /// Strong 64-bit digest of the chunk bytes.
    #[must_use]
    pub const fn strong(&self) -> u64 {
        self.strong
    }

    /// Number of bytes the signature covers.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the signature covers an empty chunk.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Contiguous byte span of fresh content that differs from a signed basis.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChangedSpan {
    /// Byte offset of the span within the fresh content.
    pub offset: u64,
    /// Length of the span in bytes.
    pub len: usize,
}

/// Chunk-level signature of one file's content, retained by the source so a
/// later modification can be shipped as patches instead of the whole file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileSignature {
    fingerprint: Fingerprint,
    len: u64,
    chunk_len: usize,
    chunks: Vec<ChunkSignature>,
}

impl FileSignature {
    /// Signs `content` with the given chunk length.
    ///
    /// A zero `chunk_len` is promoted to [`DEFAULT_CHUNK_LEN`].
    #[must_use]
    pub fn of(content: &[u8], chunk_len: usize) -> Self {
        let chunk_len = if chunk_len == 0 {
            DEFAULT_CHUNK_LEN
        } else {
            chunk_len
        };
        let chunks = content.chunks(chunk_len).map(ChunkSignature::of).collect();
        Self {
            fingerprint: Fingerprint::of(content),
            len: content.len() as u64,
            chunk_len,
            chunks,
        }
    }

    /// Fingerprint of the content the signature was computed from.
    #[must_use]
    pub const fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Length in bytes of the signed content.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` when the signed content was empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunk length the signature was computed with.
    #[must_use]
    pub const fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Number of chunks in the signature.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Compares `fresh` content against the signature chunk by chunk and
    /// returns the spans of `fresh` that differ from the signed basis.
    ///
    /// Adjacent changed chunks are merged into a single span. A caller that
    /// overwrites the returned spans onto the basis content and resizes the
    /// result to `fresh.len()` obtains exactly `fresh`; chunks beyond the end
    /// of `fresh` are handled by that final truncation and produce no span.
    #[must_use]
    pub fn changed_spans(&self, fresh: &[u8]) -> Vec<ChangedSpan> {
        let mut spans: Vec<ChangedSpan> = Vec::new();
        for (index, chunk) in fresh.chunks(self.chunk_len).enumerate() {
            let unchanged = self
                .chunks
                .get(index)
                .is_some_and(|signed| *signed == ChunkSignature::of(chunk));
            if unchanged {
                continue;
            }
            let offset = (index * self.chunk_len) as u64;
            match spans.last_mut() {
                Some(last) if last.offset + last.len as u64 == offset => {
                    last.len += chunk.len();
                }
                _ => spans.push(ChangedSpan {
                    offset,
                    len: chunk.len(),
                }),
            }
        }
        spans
    }
}
