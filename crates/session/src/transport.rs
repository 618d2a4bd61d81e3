use protocol::{SyncBatch, SyncOutcome};
use thiserror::Error;

/// Failure of one transport attempt.
///
/// Transport errors are transient by definition; the session retries them
/// under its [`RetryPolicy`](crate::RetryPolicy). A target that *received*
/// the batch but could not apply it reports that through [`SyncOutcome`],
/// never through this type.
#[derive(Debug, Error)]
#[error("transport failed: {reason}")]
pub struct TransportError {
    reason: String,
}

impl TransportError {
    /// Creates a transport error from a human-readable reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Channel carrying sync batches from source to target.
///
/// The contract is at-least-once: a batch may be delivered more than once
/// (a retry after a lost acknowledgement redelivers it), and implementations
/// never reorder two calls. Every batch type is `serde`-serializable, so an
/// implementation is free to move bytes across a real machine boundary.
pub trait SyncTransport {
    /// Delivers `batch` to the target and returns its application outcome.
    fn call(&mut self, batch: &SyncBatch) -> Result<SyncOutcome, TransportError>;
}
