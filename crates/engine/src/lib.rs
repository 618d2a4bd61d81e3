#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` holds both halves of the replication core: the source-side
//! [`DiffEngine`] that turns tree state and filesystem events into minimal
//! ordered [`protocol::SyncBatch`]es, and the target-side [`UpdateApplier`]
//! that replays a batch idempotently against the target tree.
//!
//! # Minimization
//!
//! Two independent policies keep syncs cheap, both tunable via
//! [`SyncConfig`]:
//!
//! - **Write skip**: an op is never emitted for a file whose last-applied
//!   fingerprint equals the current source fingerprint. Tracking is purely
//!   source-side; the target is never asked what it holds.
//! - **Chunk diff**: a modified file at or above the large-file threshold is
//!   shipped as chunk patches against the signature cached from the last
//!   sync instead of as full content. When no usable signature exists, or
//!   the target reports content drift, full content is the fallback.
//!
//! # Correctness
//!
//! After [`UpdateApplier::apply`] returns `Ok` for a batch produced by the
//! diff engine, the target subtree equals the source snapshot the batch was
//! derived from: full batches delete strays via the manifest and replay
//! every differing entry, incremental batches patch exactly the affected
//! subtree, and op ordering guarantees parents exist before their children
//! are touched. Every op except a drifting chunk patch is idempotent, so
//! replaying a batch (at-least-once transport) cannot diverge the tree.

mod apply;
mod cache;
mod config;
mod diff;
mod error;

pub use apply::UpdateApplier;
pub use cache::SignatureCache;
pub use config::SyncConfig;
pub use diff::{DiffEngine, SyncPlan};
pub use error::EngineError;
