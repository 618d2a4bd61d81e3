#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `session` wires the replication core into a running source/target pair:
//! a [`SyncSession`] owns the source side (initial sync, watch lifecycle,
//! event queue, transport retries) and a [`SyncTarget`] is the entire remote
//! side. Between them sits the [`SyncTransport`] trait; the in-process
//! [`LoopbackTransport`] is provided, and any channel that can move
//! serialized batches can stand in for it.
//!
//! # Lifecycle
//!
//! [`SyncSession::start`] ships a full-scope batch and then registers a
//! watch on the root and every directory beneath it. Each watch event lands
//! in an internal queue; [`SyncSession::process_pending`] drains it, turning
//! each event into at most one incremental batch. After every acknowledged
//! batch the watch set is reconciled against the newly applied snapshot, so
//! directories gain watches when they appear and lose them when they go.
//!
//! # Failure handling
//!
//! Transport faults are retried with exponential backoff under a
//! [`RetryPolicy`]. A target that reports content drift gets the affected
//! file resent as full content within the same batch. Filesystem and
//! ordering failures on the target are terminal and surface as
//! [`SessionError`].

mod error;
mod retry;
mod session;
mod target;
mod transport;
mod watch;

pub use error::SessionError;
pub use retry::RetryPolicy;
pub use session::SyncSession;
pub use target::{LoopbackTransport, SyncTarget};
pub use transport::{SyncTransport, TransportError};
pub use watch::WatchManager;
