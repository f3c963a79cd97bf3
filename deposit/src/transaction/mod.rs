//! Multi-table transaction snapshots and patch operations.
//!
//! A transaction body receives [`TableSnapshots`]: an in-memory copy of every table it
//! named, keyed by table. The body edits the snapshots freely; when it returns `Ok`,
//! each table is rewritten from its final snapshot.
mod patch;
mod snapshots;

pub use patch::*;
pub use snapshots::*;
