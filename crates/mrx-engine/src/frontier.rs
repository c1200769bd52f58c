//! The safe-release frontier: the watermark below which every live link has
//! proven no older frame can still arrive.

use mrx_schemas::{seq, Stage};

use crate::tracker::LinkTracker;

/// Stage preference when picking a link's progress marker. Forwarding
/// implies consumption implies hardware receipt, so the furthest-downstream
/// valid snapshot is the tightest proof of how far the link has advanced.
const COMMITTED_STAGE_ORDER: [Stage; 3] = [Stage::FwForwarded, Stage::FwConsumed, Stage::MacHw];

/// The global release watermark. Recomputed on demand, never persisted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Frontier {
    /// Some live link has not yet produced any valid snapshot; nothing can
    /// be proven releasable.
    Unknown,
    /// Entries with a global timestamp at or before this value are safe.
    At(u32),
}

impl Frontier {
    /// `true` iff an entry with this timestamp is provably ordered.
    pub fn permits(self, global_ts: u32) -> bool {
        match self {
            Frontier::Unknown => false,
            Frontier::At(watermark) => seq::global_ts_gte(watermark, global_ts),
        }
    }
}

/// Recompute the frontier from the tracker's live links.
///
/// Each live link contributes the global timestamp of its most advanced
/// committed-stage snapshot; the frontier is the minimum contribution,
/// compared modulo wraparound. A live link with no valid snapshot at any
/// stage pins the frontier at [`Frontier::Unknown`]. Drained links are
/// skipped entirely.
pub fn recompute(tracker: &LinkTracker) -> Frontier {
    let mut watermark: Option<u32> = None;

    for (_, state) in tracker.live_links() {
        let progress = COMMITTED_STAGE_ORDER
            .iter()
            .find_map(|stage| LinkTracker::stage_snapshot(state, *stage).params().copied());

        let ts = match progress {
            Some(p) => p.global_ts,
            None => return Frontier::Unknown,
        };

        watermark = Some(match watermark {
            None => ts,
            Some(current) if !seq::global_ts_gte(ts, current) => ts,
            Some(current) => current,
        });
    }

    match watermark {
        Some(ts) => Frontier::At(ts),
        None => Frontier::Unknown,
    }
}
