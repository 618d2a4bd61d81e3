use serde::{Deserialize, Serialize};

/// Classification of a failed update application.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The target filesystem rejected the operation.
    Filesystem,
    /// The batch violated an ordering invariant; indicates a diff-engine
    /// bug and is never retried.
    Protocol,
    /// A chunk delta's base fingerprint did not match the target's current
    /// content. The source recovers by resending full content for the
    /// affected file.
    ContentDrift,
}

/// Status returned by the target after applying a batch.
///
/// The target never rolls back the already-applied prefix of a failed
/// batch; the outcome carries enough for the source to decide between
/// retrying the whole batch (safe, every op is idempotent) and aborting.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Every op in the batch applied successfully.
    Ok,
    /// Application stopped at the op addressing `path`.
    Failed {
        /// Root-relative path of the failing op.
        path: String,
        /// Why the op failed.
        kind: FailureKind,
    },
}

impl SyncOutcome {
    /// Builds a failure outcome.
    #[must_use]
    pub fn failed(path: impl Into<String>, kind: FailureKind) -> Self {
        Self::Failed {
            path: path.into(),
            kind,
        }
    }

    /// Returns `true` when the batch fully applied.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_round_trips_through_serde() {
        let outcome = SyncOutcome::failed("a/b", FailureKind::ContentDrift);
        let json = serde_json::to_string(&outcome).expect("serialize");
        let back: SyncOutcome = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, outcome);
        assert!(!back.is_ok());
        assert!(SyncOutcome::Ok.is_ok());
    }
}
