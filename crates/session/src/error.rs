use engine::EngineError;
use thiserror::Error;

use crate::transport::TransportError;

/// Terminal session failure.
///
/// Everything here means the session stopped making progress: transient
/// transport faults and recoverable content drift are handled internally and
/// never surface as an error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Planning against the source tree failed.
    #[error("source planning failed")]
    Engine(#[from] EngineError),
    /// The transport kept failing until the retry budget ran out.
    #[error("transport gave up after {attempts} attempts")]
    Transport {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last transport failure.
        #[source]
        source: TransportError,
    },
    /// The target rejected the batch as malformed, which indicates a
    /// planning bug rather than a runtime condition.
    #[error("target rejected batch ordering at '{path}'")]
    Protocol {
        /// Path of the op the target refused.
        path: String,
    },
    /// The target's filesystem refused an op, or drift recovery could not
    /// rebuild the affected file.
    #[error("target could not apply op at '{path}'")]
    Apply {
        /// Path of the op that failed.
        path: String,
    },
}
