use engine::UpdateApplier;
use protocol::{SyncBatch, SyncOutcome};
use vfs::Filesystem;

use crate::transport::{SyncTransport, TransportError};

/// Target endpoint: owns the target filesystem handle and replays batches
/// beneath its root.
///
/// This is the whole remote side of the protocol; a deployment wraps it in
/// whatever RPC server moves serialized batches and outcomes.
pub struct SyncTarget<F> {
    fs: F,
    applier: UpdateApplier,
}

impl<F: Filesystem> SyncTarget<F> {
    /// Creates a target writing beneath `root` on `fs`.
    pub fn new(fs: F, root: impl Into<String>) -> Self {
        Self {
            fs,
            applier: UpdateApplier::new(root),
        }
    }

    /// Applies one batch and reports the outcome.
    pub fn handle(&self, batch: &SyncBatch) -> SyncOutcome {
        self.applier.apply(&self.fs, batch)
    }

    /// Target filesystem handle, exposed for inspection in tests.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Root the target writes beneath.
    #[must_use]
    pub fn root(&self) -> &str {
        self.applier.root()
    }
}

/// In-process transport delivering each batch directly to a [`SyncTarget`].
///
/// Never fails at the transport layer; useful on its own for same-machine
/// mirroring and as the innermost layer under fault-injecting test wrappers.
pub struct LoopbackTransport<F> {
    target: SyncTarget<F>,
}

impl<F: Filesystem> LoopbackTransport<F> {
    /// Creates a loopback transport around `target`.
    pub fn new(target: SyncTarget<F>) -> Self {
        Self { target }
    }

    /// The wrapped target.
    pub fn target(&self) -> &SyncTarget<F> {
        &self.target
    }
}

impl<F: Filesystem> SyncTransport for LoopbackTransport<F> {
    fn call(&mut self, batch: &SyncBatch) -> Result<SyncOutcome, TransportError> {
        Ok(self.target.handle(batch))
    }
}
