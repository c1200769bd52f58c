//! Bounded-retry snapshot reads over a [`SnapshotSource`].

use std::fmt;

use mrx_schemas::{LinkId, SnapshotValue, Stage};
use tracing::{debug, warn};

use crate::words;

/// Maximum number of raw reads attempted before a persistently torn slot is
/// reported as [`SnapshotValue::Invalid`].
pub const SNAPSHOT_READ_RETRY_LIMIT: usize = 5;

/// Hard failures of snapshot access.
///
/// Torn and not-yet-captured reads are *not* errors; the only failure a
/// source can report is that the link's snapshot memory no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// The link was torn down; its snapshot memory is gone. The caller must
    /// treat the link as fully drained.
    LinkGone { link_id: LinkId, stage: Stage },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::LinkGone { link_id, stage } => {
                write!(f, "snapshot memory gone for {link_id} stage {stage}")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Access to the raw shared snapshot memory.
///
/// Implementations must be cheap, non-blocking and safe to call from any
/// thread; each call is a fresh read of the underlying words (no caching),
/// so that the retry protocol in [`read_snapshot`] can observe an update
/// completing.
pub trait SnapshotSource: Send + Sync {
    /// Read the `(low, high)` word pair for one (link, stage) slot.
    fn read_words(&self, link_id: LinkId, stage: Stage) -> Result<(u32, u32), SnapshotError>;
}

/// Read and validate the snapshot for `(link_id, stage)`.
///
/// Torn reads are retried up to [`SNAPSHOT_READ_RETRY_LIMIT`] times.
/// Exhausting the budget degrades to `Ok(SnapshotValue::Invalid)`: a stale
/// snapshot must never block the pipeline, it merely fails to prove that
/// releasing frames is safe. The only `Err` is [`SnapshotError::LinkGone`].
pub fn read_snapshot(
    source: &dyn SnapshotSource,
    link_id: LinkId,
    stage: Stage,
) -> Result<SnapshotValue, SnapshotError> {
    for attempt in 0..SNAPSHOT_READ_RETRY_LIMIT {
        let (low, high) = source.read_words(link_id, stage)?;

        match words::validate(low, high) {
            Some(value) => {
                if attempt > 0 {
                    debug!(
                        %link_id,
                        %stage,
                        attempts = attempt + 1,
                        "snapshot read settled after torn reads"
                    );
                }
                return Ok(value);
            }
            None => continue,
        }
    }

    warn!(
        %link_id,
        %stage,
        attempts = SNAPSHOT_READ_RETRY_LIMIT,
        "snapshot still torn after retry budget, treating as invalid"
    );
    Ok(SnapshotValue::Invalid)
}
