use thiserror::Error;
use vfs::FsError;

/// Failure raised while computing a sync plan on the source side.
///
/// Target-side application failures never surface here; they travel back as
/// a [`protocol::SyncOutcome`] so the source can decide between retry and
/// abort.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading the source tree failed.
    #[error("source filesystem error")]
    Filesystem(#[from] FsError),
}
