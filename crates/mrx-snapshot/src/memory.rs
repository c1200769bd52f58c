//! In-memory snapshot slots.
//!
//! The production driver maps the target's shared memory directly; this
//! source backs the same slot layout with host atomics so the engine,
//! simulations, and tests can run against it. Writers mimic the target:
//! the low word is stored before the high word, with release/acquire
//! ordering, so a concurrent reader can legitimately observe a torn pair.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use mrx_schemas::{LinkId, SnapshotParams, Stage, MAX_LINKS};

use crate::reader::{SnapshotError, SnapshotSource};
use crate::words;

#[derive(Default)]
struct Slot {
    low: AtomicU32,
    high: AtomicU32,
}

#[derive(Default)]
struct LinkSlots {
    gone: AtomicBool,
    stages: [Slot; Stage::ALL.len()],
}

/// Snapshot memory for every (link, stage) slot, shared between writers
/// (the simulated target) and readers (the reorder engine).
#[derive(Default)]
pub struct MemorySnapshotSource {
    links: [LinkSlots; MAX_LINKS],
}

impl MemorySnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, link_id: LinkId, stage: Stage) -> &Slot {
        &self.links[link_id.index()].stages[stage as usize]
    }

    /// Publish a snapshot for `(link_id, stage)`, low word first.
    pub fn write(&self, link_id: LinkId, stage: Stage, params: SnapshotParams) {
        let (low, high) = words::pack(params);
        let slot = self.slot(link_id, stage);
        slot.low.store(low, Ordering::Release);
        slot.high.store(high, Ordering::Release);
    }

    /// Store raw words verbatim. Lets tests plant torn or otherwise
    /// inconsistent pairs.
    pub fn write_raw(&self, link_id: LinkId, stage: Stage, low: u32, high: u32) {
        let slot = self.slot(link_id, stage);
        slot.low.store(low, Ordering::Release);
        slot.high.store(high, Ordering::Release);
    }

    /// Clear every stage slot of a link back to the not-captured state.
    pub fn invalidate(&self, link_id: LinkId) {
        let (low, high) = words::EMPTY_WORDS;
        for stage in Stage::ALL {
            let slot = self.slot(link_id, stage);
            slot.low.store(low, Ordering::Release);
            slot.high.store(high, Ordering::Release);
        }
    }

    /// Mark a link's snapshot memory as unmapped. Subsequent reads fail
    /// with [`SnapshotError::LinkGone`] until [`Self::restore_link`].
    pub fn mark_link_gone(&self, link_id: LinkId) {
        self.links[link_id.index()].gone.store(true, Ordering::Release);
    }

    /// Remap a previously removed link, with all slots cleared.
    pub fn restore_link(&self, link_id: LinkId) {
        self.invalidate(link_id);
        self.links[link_id.index()].gone.store(false, Ordering::Release);
    }
}

impl SnapshotSource for MemorySnapshotSource {
    fn read_words(&self, link_id: LinkId, stage: Stage) -> Result<(u32, u32), SnapshotError> {
        if self.links[link_id.index()].gone.load(Ordering::Acquire) {
            return Err(SnapshotError::LinkGone { link_id, stage });
        }
        let slot = self.slot(link_id, stage);
        let low = slot.low.load(Ordering::Acquire);
        let high = slot.high.load(Ordering::Acquire);
        Ok((low, high))
    }
}

#[cfg(test)]
mod tests {
    use mrx_schemas::SnapshotValue;

    use super::*;
    use crate::reader::read_snapshot;

    #[test]
    fn fresh_source_reads_invalid_everywhere() {
        let source = MemorySnapshotSource::new();
        for stage in Stage::ALL {
            let value = read_snapshot(&source, LinkId(0), stage).unwrap();
            assert_eq!(value, SnapshotValue::Invalid);
        }
    }

    #[test]
    fn write_then_read_roundtrips() {
        let source = MemorySnapshotSource::new();
        let params = SnapshotParams {
            mgmt_pkt_ctr: 100,
            global_ts: 50_000,
        };
        source.write(LinkId(2), Stage::FwConsumed, params);

        let value = read_snapshot(&source, LinkId(2), Stage::FwConsumed).unwrap();
        assert_eq!(value, SnapshotValue::Valid(params));

        // Other slots of the same link are untouched.
        let other = read_snapshot(&source, LinkId(2), Stage::MacHw).unwrap();
        assert_eq!(other, SnapshotValue::Invalid);
    }

    #[test]
    fn invalidate_clears_all_stages() {
        let source = MemorySnapshotSource::new();
        let params = SnapshotParams {
            mgmt_pkt_ctr: 1,
            global_ts: 1,
        };
        for stage in Stage::ALL {
            source.write(LinkId(1), stage, params);
        }
        source.invalidate(LinkId(1));
        for stage in Stage::ALL {
            let value = read_snapshot(&source, LinkId(1), stage).unwrap();
            assert_eq!(value, SnapshotValue::Invalid);
        }
    }

    #[test]
    fn gone_link_fails_and_restore_recovers() {
        let source = MemorySnapshotSource::new();
        source.mark_link_gone(LinkId(3));

        let err = read_snapshot(&source, LinkId(3), Stage::MacHw).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::LinkGone {
                link_id: LinkId(3),
                stage: Stage::MacHw,
            }
        );

        source.restore_link(LinkId(3));
        let value = read_snapshot(&source, LinkId(3), Stage::MacHw).unwrap();
        assert_eq!(value, SnapshotValue::Invalid);
    }

    #[test]
    fn planted_torn_pair_degrades_to_invalid() {
        let source = MemorySnapshotSource::new();
        let (low, _) = words::pack(SnapshotParams {
            mgmt_pkt_ctr: 5,
            global_ts: 10,
        });
        let (_, high) = words::pack(SnapshotParams {
            mgmt_pkt_ctr: 4,
            global_ts: 9,
        });
        source.write_raw(LinkId(0), Stage::FwForwarded, low, high);

        let value = read_snapshot(&source, LinkId(0), Stage::FwForwarded).unwrap();
        assert_eq!(value, SnapshotValue::Invalid);
    }
}
