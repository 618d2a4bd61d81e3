#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Content hashing for the treesync replication engine.
//!
//! Two levels of hashing keep replication cheap:
//!
//! - [`Fingerprint`] is a whole-file XXH3-128 digest. Equal fingerprints mean
//!   a file does not need to be rewritten or retransmitted at all.
//! - [`FileSignature`] splits a file into fixed-length chunks and records a
//!   weak Adler-style checksum plus a strong XXH3-64 digest per chunk. When a
//!   large file changes, comparing the cached signature against the fresh
//!   content yields the byte spans that actually differ, bounding the
//!   transmitted payload by the changed chunks rather than the file size.
//!
//! The weak checksum ([`RollingChecksum`]) rejects almost all mismatches with
//! a few adds per byte; the strong digest confirms the rare weak collisions
//! so a changed chunk is never mistaken for an unchanged one.

mod fingerprint;
mod rolling;
mod signature;

pub use fingerprint::Fingerprint;
pub use rolling::{RollingChecksum, RollingDigest};
pub use signature::{ChangedSpan, ChunkSignature, DEFAULT_CHUNK_LEN, FileSignature};
