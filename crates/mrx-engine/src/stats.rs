//! Ingress/egress accounting for one engine instance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DeliveryEvent, DropKind};

/// Monotonic per-engine counters. Snapshot with [`crate::ReorderEngine::stats`];
/// serializable so embedders can export the report as JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderStats {
    /// Frames carried by `fw_forwarded` events.
    pub ingested_frames: u64,
    /// `fw_consumed` notifications (payload-less slots).
    pub ingested_fw_consumed: u64,
    /// `host_drop` notifications (payload-less slots).
    pub ingested_host_drops: u64,

    /// Deliveries through the ordered path.
    pub released_in_order: u64,
    /// Deliveries with the degraded-ordering flag.
    pub released_degraded: u64,
    /// Events handed straight through with reordering disabled.
    pub passed_through: u64,

    pub dropped_host: u64,
    pub dropped_fw: u64,
    pub dropped_stale: u64,
    pub dropped_link_gone: u64,

    /// Insertions rejected because the `(link, counter)` slot was already
    /// pending or already delivered.
    pub duplicates_rejected: u64,
    /// Tracker updates ignored because the counter moved backwards.
    pub counter_regressions: u64,
    /// Age-out batches released by the tick handler.
    pub ageout_flushes: u64,
}

impl ReorderStats {
    /// Account one event as it is handed to the consumer.
    pub(crate) fn note_delivery(&mut self, event: &DeliveryEvent) {
        match event {
            DeliveryEvent::Frame { reason, .. } => {
                if reason.is_degraded() {
                    self.released_degraded += 1;
                } else {
                    self.released_in_order += 1;
                }
            }
            DeliveryEvent::Drop { kind, .. } => match kind {
                DropKind::Host => self.dropped_host += 1,
                DropKind::Fw => self.dropped_fw += 1,
                DropKind::Stale => self.dropped_stale += 1,
                DropKind::LinkGone => self.dropped_link_gone += 1,
            },
        }
    }

    pub fn total_ingested(&self) -> u64 {
        self.ingested_frames + self.ingested_fw_consumed + self.ingested_host_drops
    }

    pub fn total_delivered(&self) -> u64 {
        self.released_in_order
            + self.released_degraded
            + self.dropped_host
            + self.dropped_fw
            + self.dropped_stale
            + self.dropped_link_gone
    }
}

impl fmt::Display for ReorderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "reorder stats:")?;
        writeln!(
            f,
            "  ingested: frames={} fw_consumed={} host_drops={}",
            self.ingested_frames, self.ingested_fw_consumed, self.ingested_host_drops
        )?;
        writeln!(
            f,
            "  released: in_order={} degraded={} passed_through={}",
            self.released_in_order, self.released_degraded, self.passed_through
        )?;
        writeln!(
            f,
            "  dropped: host={} fw={} stale={} link_gone={}",
            self.dropped_host, self.dropped_fw, self.dropped_stale, self.dropped_link_gone
        )?;
        write!(
            f,
            "  anomalies: duplicates={} regressions={} ageout_flushes={}",
            self.duplicates_rejected, self.counter_regressions, self.ageout_flushes
        )
    }
}

#[cfg(test)]
mod tests {
    use mrx_schemas::{FrameMeta, LinkId};

    use super::*;
    use crate::types::{ManagementFrame, ReleaseReason};

    fn meta() -> FrameMeta {
        FrameMeta {
            link_id: LinkId(0),
            mgmt_pkt_ctr: 1,
            global_ts: 10,
        }
    }

    #[test]
    fn deliveries_land_in_the_right_bucket() {
        let mut stats = ReorderStats::default();

        stats.note_delivery(&DeliveryEvent::Frame {
            frame: ManagementFrame::new(meta(), vec![]),
            reason: ReleaseReason::FrontierReached,
        });
        stats.note_delivery(&DeliveryEvent::Frame {
            frame: ManagementFrame::new(meta(), vec![]),
            reason: ReleaseReason::AgedOut,
        });
        stats.note_delivery(&DeliveryEvent::Drop {
            meta: meta(),
            kind: DropKind::Fw,
            reason: ReleaseReason::FrontierReached,
        });

        assert_eq!(stats.released_in_order, 1);
        assert_eq!(stats.released_degraded, 1);
        assert_eq!(stats.dropped_fw, 1);
        assert_eq!(stats.total_delivered(), 3);
    }

    #[test]
    fn report_renders_every_section() {
        let stats = ReorderStats::default();
        let report = stats.to_string();
        assert!(report.contains("ingested:"));
        assert!(report.contains("released:"));
        assert!(report.contains("dropped:"));
        assert!(report.contains("anomalies:"));
    }
}
