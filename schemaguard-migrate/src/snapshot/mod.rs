//! Point-in-time schema snapshots and drift detection.
//!
//! A snapshot captures every table's columns, indexes, foreign keys and row
//! count, stamped with a content version (a digest of the capture) and a
//! format version (the capture logic's own version). Snapshots are immutable:
//! they are created, read, compared and deleted, never updated.

mod diff;
mod document;
mod format;
mod manager;
mod store;

pub use diff::SnapshotDiff;
pub use document::{
    DatabaseIdentity, FormatVersionMismatchWarning, SNAPSHOT_FORMAT_VERSION, SchemaCapture,
    SnapshotDocument, TableCapture, VERSION_LEN,
};
pub use format::SnapshotFormat;
pub use manager::{DATA_ROW_LIMIT, SnapshotManager};
pub use store::{ArtifactStore, FileStore, MemoryStore};
