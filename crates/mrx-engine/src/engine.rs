//! The reorder engine: ingestion entry points, snapshot polling, frontier
//! evaluation and ordered delivery, behind two locks.
//!
//! Lock discipline: `delivery` is always taken before `state`, and every
//! path that hands events to the consumer holds `delivery` for the whole
//! batch. `state` guards the tracker, the list and the counters, and is
//! held only for short, non-blocking critical sections; it is released
//! before each consumer callback so ingestion on other links can proceed
//! while the consumer runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mrx_schemas::{seq, FrameMeta, LinkId, SnapshotValue, Stage};
use mrx_snapshot::{read_snapshot, SnapshotError, SnapshotSource};
use tracing::{debug, info, warn};

use crate::config::ReorderConfig;
use crate::frontier;
use crate::list::{EntrySlot, InsertOutcome, ReorderList};
use crate::stats::ReorderStats;
use crate::tracker::{LinkTracker, UpdateOutcome};
use crate::types::{DeliveryEvent, DropKind, ManagementFrame, ReleaseReason, ReorderError};

/// The upper-layer management-frame consumer.
///
/// Called with `delivery` held, in exact release order. The consumer must
/// be bounded-time; a consumer that stalls back-pressures every ingestion
/// entry point.
pub trait FrameConsumer: Send {
    fn deliver(&mut self, event: DeliveryEvent);
}

struct EngineState {
    tracker: LinkTracker,
    list: ReorderList,
    stats: ReorderStats,
}

/// One reorder context for a multi-link device.
pub struct ReorderEngine<C: FrameConsumer> {
    config: ReorderConfig,
    snapshots: Arc<dyn SnapshotSource>,
    state: Mutex<EngineState>,
    delivery: Mutex<C>,
}

impl<C: FrameConsumer> ReorderEngine<C> {
    pub fn new(config: ReorderConfig, snapshots: Arc<dyn SnapshotSource>, consumer: C) -> Self {
        info!(
            enabled = config.enabled,
            max_list_size = config.max_list_size,
            entry_timeout_ticks = config.entry_timeout_ticks,
            "reorder engine created"
        );
        Self {
            config,
            snapshots,
            state: Mutex::new(EngineState {
                tracker: LinkTracker::new(),
                list: ReorderList::new(),
                stats: ReorderStats::default(),
            }),
            delivery: Mutex::new(consumer),
        }
    }

    pub fn config(&self) -> &ReorderConfig {
        &self.config
    }

    pub fn stats(&self) -> ReorderStats {
        self.state().stats.clone()
    }

    /// Entries currently waiting in the reorder list.
    pub fn pending(&self) -> usize {
        self.state().list.len()
    }

    // -----------------------------------------------------------------------
    // Link lifecycle
    // -----------------------------------------------------------------------

    pub fn register_link(&self, link_id: LinkId) -> Result<(), ReorderError> {
        // Snapshot memory is a fixed per-link array; ids beyond it cannot
        // reference a live link.
        if link_id.index() >= mrx_schemas::MAX_LINKS {
            return Err(ReorderError::LinkOutOfRange(link_id));
        }
        let mut st = self.state();
        st.tracker.register(link_id)?;
        info!(%link_id, "link registered");
        Ok(())
    }

    /// Tear a link down: its pending slots are delivered as drops, it stops
    /// constraining the frontier, and frames the teardown was blocking are
    /// released.
    pub fn deregister_link(&self, link_id: LinkId) -> Result<(), ReorderError> {
        let mut consumer = self.consumer();
        let drops = {
            let mut st = self.state();
            st.tracker.mark_drained(link_id)?;
            let drained = st.list.drain_link(link_id);
            let mut drops = Vec::with_capacity(drained.len());
            for entry in drained {
                let event = entry.into_event(ReleaseReason::LinkDrained);
                st.stats.note_delivery(&event);
                drops.push(event);
            }
            st.tracker.remove(link_id)?;
            drops
        };
        info!(%link_id, pending_dropped = drops.len(), "link deregistered");
        for event in drops {
            consumer.deliver(event);
        }
        self.release_ready(&mut consumer);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event ingestion
    // -----------------------------------------------------------------------

    /// A frame forwarded by firmware, payload included.
    pub fn on_fw_forwarded(
        &self,
        meta: FrameMeta,
        payload: Vec<u8>,
        now_tick: u64,
    ) -> Result<(), ReorderError> {
        if !self.config.enabled {
            return self.pass_through(
                DeliveryEvent::Frame {
                    frame: ManagementFrame::new(meta, payload),
                    reason: ReleaseReason::PassThrough,
                },
                |stats| stats.ingested_frames += 1,
            );
        }
        self.ingest(meta, EntrySlot::Frame(payload), Stage::FwForwarded, now_tick)
    }

    /// Firmware consumed a frame; it will never reach the host. The slot is
    /// queued so the consumer receives an ordered drop notification.
    pub fn on_fw_consumed(&self, meta: FrameMeta, now_tick: u64) -> Result<(), ReorderError> {
        if !self.config.enabled {
            return self.pass_through(
                DeliveryEvent::Drop {
                    meta,
                    kind: DropKind::Fw,
                    reason: ReleaseReason::PassThrough,
                },
                |stats| stats.ingested_fw_consumed += 1,
            );
        }
        self.ingest(meta, EntrySlot::FwConsumed, Stage::FwConsumed, now_tick)
    }

    /// The host parsed a forwarded frame's descriptor but could not
    /// materialize the payload. The slot is queued so the frontier is not
    /// stalled waiting for a frame that will never arrive.
    pub fn on_host_drop(&self, meta: FrameMeta, now_tick: u64) -> Result<(), ReorderError> {
        if !self.config.enabled {
            return self.pass_through(
                DeliveryEvent::Drop {
                    meta,
                    kind: DropKind::Host,
                    reason: ReleaseReason::PassThrough,
                },
                |stats| stats.ingested_host_drops += 1,
            );
        }
        self.ingest(meta, EntrySlot::HostDrop, Stage::FwForwarded, now_tick)
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance engine time. Entries older than the configured timeout are
    /// aged out and released in degraded order, together with everything
    /// ordered before the latest aged entry.
    pub fn on_tick(&self, now_tick: u64) {
        if !self.config.enabled {
            return;
        }
        let mut consumer = self.consumer();
        {
            let mut st = self.state();
            let marked = st.list.mark_aged(now_tick, self.config.entry_timeout_ticks);
            if marked > 0 {
                st.stats.ageout_flushes += 1;
                warn!(
                    marked,
                    now_tick,
                    timeout_ticks = self.config.entry_timeout_ticks,
                    "consistency timeout, releasing aged entries with degraded ordering"
                );
            }
        }
        self.release_ready(&mut consumer);
    }

    /// Flush everything still pending, in best-effort order, flagged
    /// degraded. Used at engine teardown.
    pub fn force_flush(&self) {
        let mut consumer = self.consumer();
        let events = {
            let mut st = self.state();
            let flushed = st.list.force_flush();
            let mut events = Vec::with_capacity(flushed.len());
            for (entry, reason) in flushed {
                st.tracker
                    .note_delivered(entry.meta.link_id, entry.meta.mgmt_pkt_ctr);
                let event = entry.into_event(reason);
                st.stats.note_delivery(&event);
                events.push(event);
            }
            events
        };
        if !events.is_empty() {
            warn!(count = events.len(), "force flush of pending entries");
        }
        for event in events {
            consumer.deliver(event);
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn consumer(&self) -> MutexGuard<'_, C> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pass_through(
        &self,
        event: DeliveryEvent,
        note_ingest: impl FnOnce(&mut ReorderStats),
    ) -> Result<(), ReorderError> {
        let mut consumer = self.consumer();
        {
            let mut st = self.state();
            note_ingest(&mut st.stats);
            st.stats.passed_through += 1;
        }
        consumer.deliver(event);
        Ok(())
    }

    fn ingest(
        &self,
        meta: FrameMeta,
        slot: EntrySlot,
        stage: Stage,
        now_tick: u64,
    ) -> Result<(), ReorderError> {
        let mut consumer = self.consumer();
        let (staged, result) = {
            let mut st = self.state();
            if !st.tracker.contains(meta.link_id) {
                return Err(ReorderError::UnknownLink(meta.link_id));
            }

            match slot {
                EntrySlot::Frame(_) => st.stats.ingested_frames += 1,
                EntrySlot::FwConsumed => st.stats.ingested_fw_consumed += 1,
                EntrySlot::HostDrop => st.stats.ingested_host_drops += 1,
            }

            // A counter at or behind the last delivered one for this link is
            // a re-delivered hardware event; its slot is already settled.
            if let Some(last) = st.tracker.last_delivered_ctr(meta.link_id) {
                if seq::pkt_ctr_delta(meta.mgmt_pkt_ctr, last) <= 0 {
                    st.stats.duplicates_rejected += 1;
                    warn!(frame = %meta, "duplicate of an already-delivered slot, discarding");
                    return Err(ReorderError::DuplicateFrame(meta.key()));
                }
            }

            // The event itself is a progress observation for its own stage.
            if st
                .tracker
                .update(meta.link_id, stage, SnapshotValue::Valid(meta.snapshot_params()))?
                == UpdateOutcome::Regression
            {
                st.stats.counter_regressions += 1;
            }

            let mut staged: Vec<DeliveryEvent> = Vec::new();
            self.poll_snapshots(&mut st, &mut staged);

            // Polling may have drained a gone link into `staged`, so a
            // rejected insert must still fall through to the delivery loop.
            let result = match st.list.insert(meta, slot, now_tick) {
                Ok(InsertOutcome::Queued) => {
                    debug!(frame = %meta, pending = st.list.len(), "queued");
                    Ok(())
                }
                Ok(InsertOutcome::Stale) => {
                    // The release cutoff already passed this slot; all that
                    // is left to deliver is the drop notification.
                    warn!(frame = %meta, "older than last released timestamp, dropping as stale");
                    let event = DeliveryEvent::Drop {
                        meta,
                        kind: DropKind::Stale,
                        reason: ReleaseReason::Stale,
                    };
                    st.stats.note_delivery(&event);
                    staged.push(event);
                    Ok(())
                }
                Err(err @ ReorderError::DuplicateFrame(_)) => {
                    st.stats.duplicates_rejected += 1;
                    warn!(frame = %meta, "duplicate pending slot, discarding");
                    Err(err)
                }
                Err(err) => Err(err),
            };

            for (entry, reason) in st.list.shed_overflow(self.config.max_list_size) {
                warn!(frame = %entry.meta, "list size limit exceeded, shedding head entry");
                st.tracker
                    .note_delivered(entry.meta.link_id, entry.meta.mgmt_pkt_ctr);
                let event = entry.into_event(reason);
                st.stats.note_delivery(&event);
                staged.push(event);
            }

            (staged, result)
        };

        for event in staged {
            consumer.deliver(event);
        }
        self.release_ready(&mut consumer);
        result
    }

    /// Read the shared snapshots of every tracked link and fold them into
    /// the tracker. A link whose snapshot memory is gone is drained on the
    /// spot; its pending slots are appended to `staged` as drops.
    fn poll_snapshots(&self, st: &mut EngineState, staged: &mut Vec<DeliveryEvent>) {
        let link_ids: Vec<LinkId> = st.tracker.link_ids().collect();
        let mut gone: Vec<LinkId> = Vec::new();

        'links: for link_id in link_ids {
            for stage in Stage::ALL {
                match read_snapshot(self.snapshots.as_ref(), link_id, stage) {
                    Ok(value) => {
                        if st.tracker.update(link_id, stage, value)
                            == Ok(UpdateOutcome::Regression)
                        {
                            st.stats.counter_regressions += 1;
                        }
                    }
                    Err(SnapshotError::LinkGone { .. }) => {
                        gone.push(link_id);
                        continue 'links;
                    }
                }
            }
        }

        for link_id in gone {
            warn!(%link_id, "snapshot memory gone, draining link");
            let _ = st.tracker.mark_drained(link_id);
            for entry in st.list.drain_link(link_id) {
                let event = entry.into_event(ReleaseReason::LinkDrained);
                st.stats.note_delivery(&event);
                staged.push(event);
            }
            let _ = st.tracker.remove(link_id);
        }
    }

    /// Pop and deliver releasable entries one at a time, recomputing the
    /// frontier between pops. Caller holds the delivery lock; the state
    /// lock is dropped around each consumer call.
    fn release_ready(&self, consumer: &mut C) {
        loop {
            let event = {
                let mut st = self.state();
                let frontier = frontier::recompute(&st.tracker);
                match st.list.pop_ready(frontier) {
                    Some((entry, reason)) => {
                        st.tracker
                            .note_delivered(entry.meta.link_id, entry.meta.mgmt_pkt_ctr);
                        let event = entry.into_event(reason);
                        st.stats.note_delivery(&event);
                        event
                    }
                    None => break,
                }
            };
            debug!(frame = %event.meta(), reason = %event.reason(), "delivering");
            consumer.deliver(event);
        }
    }
}
