//! Block partitioning, change detection and scroll mapping
//!
//! This module holds the pure core of the incremental preview: splitting a
//! document into marker-delimited blocks, diffing two partitioned versions,
//! and mapping between source lines and block coordinates.

mod commands;
mod differ;
mod position;
mod scanner;
mod sync_scroll;

pub use differ::{diff, split_blocks, DiffResult, RebuildReason};
pub use position::{locate, source_line, viewport_mid_line, BlockPosition};
pub use scanner::partition;
pub use sync_scroll::{ScrollOrigin, SyncScrollState};
