//! The multi-link reorder list: every pending slot across all links, kept
//! sorted by `(global_ts, link_id, mgmt_pkt_ctr)`.
//!
//! Global timestamps wrap, so there is no total order to hand to a tree
//! container; the list is a deque kept sorted by modular comparison, with a
//! linear insertion scan. New frames land at or near the tail in the common
//! case, and the size limit bounds the scan.

use std::collections::VecDeque;

use mrx_schemas::{seq, FrameMeta, LinkId};

use crate::frontier::Frontier;
use crate::types::{DeliveryEvent, DropKind, ManagementFrame, ReleaseReason, ReorderError};

/// What a pending slot stands for. Payload-less slots still occupy their
/// ordering position so the consumer sees an explicit drop, not a hole.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntrySlot {
    Frame(Vec<u8>),
    FwConsumed,
    HostDrop,
}

/// One pending slot awaiting release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub meta: FrameMeta,
    pub slot: EntrySlot,
    pub inserted_tick: u64,
    /// Set by age-out marking; overrides the frontier check on release.
    forced: Option<ReleaseReason>,
}

impl Entry {
    /// Convert a released entry into the event the consumer receives.
    ///
    /// A frame released because its link drained is delivered as a drop,
    /// not as an out-of-order frame.
    pub fn into_event(self, reason: ReleaseReason) -> DeliveryEvent {
        match self.slot {
            EntrySlot::Frame(payload) => {
                if reason == ReleaseReason::LinkDrained {
                    DeliveryEvent::Drop {
                        meta: self.meta,
                        kind: DropKind::LinkGone,
                        reason,
                    }
                } else {
                    DeliveryEvent::Frame {
                        frame: ManagementFrame::new(self.meta, payload),
                        reason,
                    }
                }
            }
            EntrySlot::FwConsumed => DeliveryEvent::Drop {
                meta: self.meta,
                kind: DropKind::Fw,
                reason,
            },
            EntrySlot::HostDrop => DeliveryEvent::Drop {
                meta: self.meta,
                kind: DropKind::Host,
                reason,
            },
        }
    }
}

/// Decision returned by [`ReorderList::insert`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Queued,
    /// The slot is older than the newest timestamp already released; queuing
    /// it would deliver it out of order, so it must be dropped instead.
    Stale,
}

/// `true` iff `a` sorts strictly before `b` in global delivery order.
fn sorts_before(a: &FrameMeta, b: &FrameMeta) -> bool {
    if a.global_ts != b.global_ts {
        return !seq::global_ts_gte(a.global_ts, b.global_ts);
    }
    if a.link_id != b.link_id {
        return a.link_id < b.link_id;
    }
    seq::pkt_ctr_delta(a.mgmt_pkt_ctr, b.mgmt_pkt_ctr) < 0
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReorderList {
    entries: VecDeque<Entry>,
    /// Global timestamp of the last slot handed to the consumer through the
    /// ordered path; the stale cutoff for new insertions.
    ts_last_released: Option<u32>,
}

impl ReorderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ts_last_released(&self) -> Option<u32> {
        self.ts_last_released
    }

    /// Queue a slot at its sorted position.
    ///
    /// Duplicate `(link, counter)` slots are rejected; slots older than the
    /// newest released timestamp come back as [`InsertOutcome::Stale`].
    pub fn insert(
        &mut self,
        meta: FrameMeta,
        slot: EntrySlot,
        now_tick: u64,
    ) -> Result<InsertOutcome, ReorderError> {
        if let Some(last) = self.ts_last_released {
            if !seq::global_ts_gte(meta.global_ts, last) {
                return Ok(InsertOutcome::Stale);
            }
        }

        let key = meta.key();
        if self.entries.iter().any(|e| e.meta.key() == key) {
            return Err(ReorderError::DuplicateFrame(key));
        }

        let entry = Entry {
            meta,
            slot,
            inserted_tick: now_tick,
            forced: None,
        };

        // Scan from the tail: new entries are usually the newest.
        let at = self
            .entries
            .iter()
            .rposition(|e| !sorts_before(&entry.meta, &e.meta))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.entries.insert(at, entry);
        Ok(InsertOutcome::Queued)
    }

    /// Pop the next releasable slot, if any.
    ///
    /// Only the head can ever be released; an unreleasable head blocks the
    /// list, which is exactly the ordering guarantee.
    pub fn pop_ready(&mut self, frontier: Frontier) -> Option<(Entry, ReleaseReason)> {
        let head = self.entries.front()?;
        let reason = match head.forced {
            Some(forced) => forced,
            None if frontier.permits(head.meta.global_ts) => ReleaseReason::FrontierReached,
            None => return None,
        };
        self.pop_front_released().map(|e| (e, reason))
    }

    /// Mark entries older than `timeout_ticks` as aged, plus everything
    /// ordered before the latest aged entry, so the whole prefix releases
    /// together in its relative order. Returns the number of entries newly
    /// marked.
    pub fn mark_aged(&mut self, now_tick: u64, timeout_ticks: u64) -> usize {
        let latest_aged = self
            .entries
            .iter()
            .rposition(|e| now_tick.saturating_sub(e.inserted_tick) > timeout_ticks);
        let cutoff = match latest_aged {
            Some(i) => i,
            None => return 0,
        };

        let mut marked = 0;
        for entry in self.entries.iter_mut().take(cutoff + 1) {
            if entry.forced.is_some() {
                continue;
            }
            entry.forced = if now_tick.saturating_sub(entry.inserted_tick) > timeout_ticks {
                Some(ReleaseReason::AgedOut)
            } else {
                Some(ReleaseReason::OlderThanAgedOut)
            };
            marked += 1;
        }
        marked
    }

    /// Shed head entries until the list is back within `max_size`.
    pub fn shed_overflow(&mut self, max_size: usize) -> Vec<(Entry, ReleaseReason)> {
        let mut shed = Vec::new();
        while self.entries.len() > max_size {
            if let Some(e) = self.pop_front_released() {
                shed.push((e, ReleaseReason::ListSizeExceeded));
            }
        }
        shed
    }

    /// Remove every pending slot belonging to `link_id`, in list order.
    ///
    /// Drained slots leave out of band, so they do not advance the stale
    /// cutoff for the surviving links.
    pub fn drain_link(&mut self, link_id: LinkId) -> Vec<Entry> {
        let mut kept = VecDeque::with_capacity(self.entries.len());
        let mut drained = Vec::new();
        for entry in self.entries.drain(..) {
            if entry.meta.link_id == link_id {
                drained.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        drained
    }

    /// Drain everything still pending, in list order.
    pub fn force_flush(&mut self) -> Vec<(Entry, ReleaseReason)> {
        let mut flushed = Vec::new();
        while let Some(e) = self.pop_front_released() {
            flushed.push((e, ReleaseReason::ForceFlush));
        }
        flushed
    }

    fn pop_front_released(&mut self) -> Option<Entry> {
        let entry = self.entries.pop_front()?;
        self.ts_last_released = Some(entry.meta.global_ts);
        Some(entry)
    }
}
