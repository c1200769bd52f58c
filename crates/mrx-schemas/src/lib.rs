//! mrx-schemas
//!
//! Shared data model for the management-frame receive reorder stack:
//! - link and pipeline-stage identifiers
//! - snapshot parameter structs (the decoded form of a hardware snapshot)
//! - frame metadata as carried by firmware events
//! - wraparound-safe packet-counter / global-timestamp arithmetic ([`seq`])
//!
//! Pure types only. No IO, no clocks, no locks.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod seq;

/// Maximum number of radio links a single reorder context can track.
pub const MAX_LINKS: usize = 16;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable index of one radio/MAC pipeline in a multi-link device.
///
/// Link ids are assigned by the platform at radio bring-up and never reused
/// while the link is registered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u8);

impl LinkId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Successive points a management frame passes through before reaching the
/// host. Hardware/firmware maintains one progress snapshot per (link, stage).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Latest frame seen at the MAC hardware.
    MacHw,
    /// Latest frame consumed by firmware (never forwarded to the host).
    FwConsumed,
    /// Latest frame forwarded by firmware towards the host.
    FwForwarded,
}

impl Stage {
    /// All stages, in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::MacHw, Stage::FwConsumed, Stage::FwForwarded];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::MacHw => "mac-hw",
            Stage::FwConsumed => "fw-consumed",
            Stage::FwForwarded => "fw-forwarded",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshot values
// ---------------------------------------------------------------------------

/// Decoded contents of one valid hardware snapshot: the per-link management
/// packet counter and the global (cross-link) timestamp of the last frame
/// seen at that stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotParams {
    /// Per-link monotonic counter, wraps at u16 range.
    pub mgmt_pkt_ctr: u16,
    /// Free-running global timestamp, wraps at u32 range.
    pub global_ts: u32,
}

/// Result of interpreting a snapshot read.
///
/// `Invalid` is the normal "nothing captured yet / read could not be
/// validated" state, never an error: downstream logic treats it as "cannot
/// yet prove ordering safety" for the link in question.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotValue {
    Invalid,
    Valid(SnapshotParams),
}

impl SnapshotValue {
    pub fn params(&self) -> Option<&SnapshotParams> {
        match self {
            SnapshotValue::Invalid => None,
            SnapshotValue::Valid(p) => Some(p),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, SnapshotValue::Valid(_))
    }
}

// ---------------------------------------------------------------------------
// Frame metadata
// ---------------------------------------------------------------------------

/// Ordering metadata carried by every firmware event and every frame:
/// which link it arrived on, its per-link counter and its global timestamp.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub link_id: LinkId,
    pub mgmt_pkt_ctr: u16,
    pub global_ts: u32,
}

impl FrameMeta {
    pub fn key(&self) -> FrameKey {
        FrameKey {
            link_id: self.link_id,
            mgmt_pkt_ctr: self.mgmt_pkt_ctr,
        }
    }

    pub fn snapshot_params(&self) -> SnapshotParams {
        SnapshotParams {
            mgmt_pkt_ctr: self.mgmt_pkt_ctr,
            global_ts: self.global_ts,
        }
    }
}

impl fmt::Display for FrameMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, ctr={}, ts={})",
            self.link_id, self.mgmt_pkt_ctr, self.global_ts
        )
    }
}

/// Identity of a frame within the reorder window: `(link, counter)`.
/// Used to reject re-delivered duplicates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameKey {
    pub link_id: LinkId,
    pub mgmt_pkt_ctr: u16,
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, ctr={})", self.link_id, self.mgmt_pkt_ctr)
    }
}
