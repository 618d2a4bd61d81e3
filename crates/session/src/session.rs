use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use engine::{DiffEngine, SignatureCache, SyncConfig, SyncPlan};
use protocol::{FailureKind, SyncOutcome};
use snapshot::TreeSnapshot;
use tracing::{debug, info, warn};
use vfs::{Filesystem, WatchCapability, WatchEvent};

use crate::error::SessionError;
use crate::retry::RetryPolicy;
use crate::transport::SyncTransport;
use crate::watch::WatchManager;

/// Source-side driver of one replication relationship.
///
/// The session owns the full source lifecycle: the initial full sync, the
/// watch registrations that mirror the directory set of the last applied
/// snapshot, the event queue those watches feed, and the retry loop around
/// the transport. One batch is in flight at a time; queued events simply
/// wait their turn, and an event whose change has already been shipped by an
/// earlier plan collapses into an empty batch.
pub struct SyncSession<F, T> {
    fs: F,
    root: String,
    transport: T,
    engine: DiffEngine,
    cache: SignatureCache,
    applied: Option<TreeSnapshot>,
    watches: WatchManager,
    sender: Sender<WatchEvent>,
    receiver: Receiver<WatchEvent>,
    retry: RetryPolicy,
}

impl<F, T> SyncSession<F, T>
where
    F: Filesystem + WatchCapability,
    T: SyncTransport,
{
    /// Creates a session replicating the subtree at `root` on `fs` through
    /// `transport`, with default policies.
    pub fn new(fs: F, root: impl Into<String>, transport: T) -> Self {
        let root = root.into();
        let (sender, receiver) = unbounded();
        Self {
            fs,
            watches: WatchManager::new(root.clone()),
            root,
            transport,
            engine: DiffEngine::default(),
            cache: SignatureCache::new(),
            applied: None,
            sender,
            receiver,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the sync policies.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.engine = DiffEngine::new(config);
        self
    }

    /// Replaces the transport retry schedule.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Performs the initial full sync and registers watches.
    ///
    /// After this returns the target mirrors the source and every directory
    /// of the source subtree is watched.
    pub fn start(&mut self) -> Result<(), SessionError> {
        info!(root = %self.root, "starting replication session");
        self.full_sync()
    }

    /// Re-runs a full sync against the current baseline.
    ///
    /// Content the baseline already accounts for is skipped; the manifest
    /// still covers the whole tree, so target strays introduced behind the
    /// session's back are deleted.
    pub fn resync(&mut self) -> Result<(), SessionError> {
        self.full_sync()
    }

    /// Drains the event queue, planning and shipping one batch per queued
    /// event. Returns the number of events handled.
    pub fn process_pending(&mut self) -> Result<usize, SessionError> {
        let mut handled = 0usize;
        while let Ok(event) = self.receiver.try_recv() {
            handled += 1;
            let Some(prev) = self.applied.as_ref() else {
                // Events observed before the first successful sync are
                // covered by the upcoming full scan.
                continue;
            };
            let plan =
                self.engine
                    .incremental_plan(&self.fs, &self.root, prev, &event, &mut self.cache)?;
            if plan.batch.is_empty() {
                self.applied = Some(plan.next);
                continue;
            }
            self.ship(plan)?;
            self.reconcile_watches();
        }
        Ok(handled)
    }

    /// Stops watching and drops any queued events.
    pub fn stop(&mut self) {
        self.watches.clear(&self.fs);
        while self.receiver.try_recv().is_ok() {}
        info!(root = %self.root, "stopped replication session");
    }

    /// Snapshot the target currently mirrors, if a sync has completed.
    #[must_use]
    pub fn last_applied(&self) -> Option<&TreeSnapshot> {
        self.applied.as_ref()
    }

    /// Number of events waiting in the queue.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.receiver.len()
    }

    /// Source root the session replicates.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    fn full_sync(&mut self) -> Result<(), SessionError> {
        let plan = self.engine.initial_plan(
            &self.fs,
            &self.root,
            self.applied.as_ref(),
            &mut self.cache,
        )?;
        self.ship(plan)?;
        self.reconcile_watches();
        Ok(())
    }

    /// Delivers a plan's batch, retrying transport faults per the policy and
    /// downgrading drifted chunk deltas to full content in place.
    fn ship(&mut self, mut plan: SyncPlan) -> Result<(), SessionError> {
        let mut attempt = 1u32;
        loop {
            match self.transport.call(&plan.batch) {
                Ok(SyncOutcome::Ok) => {
                    debug!(ops = plan.batch.op_count(), "batch acknowledged");
                    self.applied = Some(plan.next);
                    return Ok(());
                }
                Ok(SyncOutcome::Failed { path, kind }) => match kind {
                    FailureKind::ContentDrift => {
                        warn!(path = %path, "target drifted; resending full content");
                        let (op, entry) =
                            self.engine
                                .refresh_full(&self.fs, &self.root, &path, &mut self.cache)?;
                        plan.next = plan.next.with_entry(&path, entry);
                        if !plan.batch.replace_op_at(&path, op) {
                            return Err(SessionError::Apply { path });
                        }
                    }
                    FailureKind::Protocol => return Err(SessionError::Protocol { path }),
                    FailureKind::Filesystem => return Err(SessionError::Apply { path }),
                },
                Err(source) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(SessionError::Transport {
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(attempt, %source, "transport attempt failed");
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn reconcile_watches(&mut self) {
        if let Some(tree) = self.applied.as_ref() {
            self.watches.reconcile(&self.fs, tree, &self.sender);
        }
    }
}
