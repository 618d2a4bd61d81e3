use checksums::FileSignature;
use rustc_hash::FxHashMap;
use vfs::path;

use crate::config::SyncConfig;

/// Source-side cache of chunk signatures for large replicated files.
///
/// An entry always describes the content most recently shipped to (or known
/// to already exist on) the target, so a later modification can be diffed
/// against it. Small files are never cached; their modifications ship as
/// full content anyway.
#[derive(Debug, Default)]
pub struct SignatureCache {
    map: FxHashMap<String, FileSignature>,
}

impl SignatureCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the signature cached for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileSignature> {
        self.map.get(path)
    }

    /// Records `content` for `path`: signs and stores it when the config
    /// makes the file chunk-diff eligible, otherwise drops any stale entry.
    pub fn record(&mut self, path: &str, content: &[u8], config: &SyncConfig) {
        if config.uses_chunk_delta(content.len() as u64) {
            self.map
                .insert(path.to_owned(), FileSignature::of(content, config.chunk_len));
        } else {
            self.map.remove(path);
        }
    }

    /// Drops the entry for `path`.
    pub fn remove(&mut self, path: &str) {
        self.map.remove(path);
    }

    /// Drops every entry at or beneath `sub`.
    pub fn remove_subtree(&mut self, sub: &str) {
        self.map
            .retain(|p, _| p != sub && !path::is_strict_ancestor(sub, p));
    }

    /// Number of cached signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Reports whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
