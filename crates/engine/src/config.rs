use checksums::DEFAULT_CHUNK_LEN;

/// Tunable sync behaviors, fixed at session construction.
///
/// Disabling a policy trades bandwidth or write volume for simplicity;
/// correctness never depends on either flag.
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Skip ops for files whose last-applied fingerprint matches the
    /// current source content.
    pub skip_unchanged: bool,
    /// Ship large-file modifications as chunk patches instead of full
    /// content.
    pub chunk_diff: bool,
    /// Minimum file size, in bytes, for the chunk-diff policy to apply.
    pub large_file_threshold: u64,
    /// Chunk length used when signing and diffing file content.
    pub chunk_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skip_unchanged: true,
            chunk_diff: true,
            large_file_threshold: 256 * 1024,
            chunk_len: DEFAULT_CHUNK_LEN,
        }
    }
}

impl SyncConfig {
    /// Reports whether a file of `len` bytes is eligible for chunk-level
    /// deltas.
    #[must_use]
    pub const fn uses_chunk_delta(&self, len: u64) -> bool {
        self.chunk_diff && len >= self.large_file_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_gates_chunk_deltas() {
        let config = SyncConfig {
            large_file_threshold: 100,
            ..SyncConfig::default()
        };
        assert!(!config.uses_chunk_delta(99));
        assert!(config.uses_chunk_delta(100));

        let disabled = SyncConfig {
            chunk_diff: false,
            ..config
        };
        assert!(!disabled.uses_chunk_delta(1_000_000));
    }
}
