//! mrx-snapshot
//!
//! Retry-tolerant access to the hardware/firmware progress snapshots shared
//! between the target and the host.
//!
//! Each (link, stage) pair owns a fixed two-word memory slot that the target
//! updates without any mutual exclusion. The host may observe a torn update;
//! consistency is recovered purely from a redundant copy of the packet
//! counter encoded in the second word, checked by [`words::validate`], plus
//! a bounded retry in [`read_snapshot`].
//!
//! Nothing here blocks, allocates, or mutates shared state: reads are pure,
//! and an unreadable snapshot degrades to [`SnapshotValue::Invalid`] rather
//! than failing the caller.

mod memory;
mod reader;
pub mod words;

pub use memory::MemorySnapshotSource;
pub use reader::{read_snapshot, SnapshotError, SnapshotSource, SNAPSHOT_READ_RETRY_LIMIT};
