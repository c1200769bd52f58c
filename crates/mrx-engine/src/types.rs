use std::fmt;

use mrx_schemas::{FrameKey, FrameMeta, LinkId};
use serde::{Deserialize, Serialize};

/// A received management frame plus its provenance.
///
/// Owned exclusively by the reorder list from insertion until it is handed
/// to the consumer (or turned into a drop notification).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagementFrame {
    pub meta: FrameMeta,
    pub payload: Vec<u8>,
}

impl ManagementFrame {
    pub fn new(meta: FrameMeta, payload: Vec<u8>) -> Self {
        Self { meta, payload }
    }
}

/// Why an entry left the reorder list.
///
/// Only `FrontierReached` (and plain `PassThrough`) deliveries carry an
/// ordering guarantee; every other reason marks the delivery as degraded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseReason {
    /// The global frontier moved past the entry; order is proven.
    FrontierReached,
    /// Reordering is disabled; events flow straight through.
    PassThrough,
    /// The entry sat in the list longer than the configured timeout.
    AgedOut,
    /// The entry was ordered before another entry that aged out.
    OlderThanAgedOut,
    /// The list exceeded its size limit and shed its head.
    ListSizeExceeded,
    /// The entry's link was torn down or its snapshot memory vanished.
    LinkDrained,
    /// The slot arrived older than the newest released timestamp and was
    /// never queued; its notification is inherently out of band.
    Stale,
    /// An explicit flush of everything still pending.
    ForceFlush,
}

impl ReleaseReason {
    /// `true` when the delivery no longer carries the ordering guarantee.
    pub fn is_degraded(self) -> bool {
        !matches!(self, ReleaseReason::FrontierReached | ReleaseReason::PassThrough)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseReason::FrontierReached => "frontier-reached",
            ReleaseReason::PassThrough => "pass-through",
            ReleaseReason::AgedOut => "aged-out",
            ReleaseReason::OlderThanAgedOut => "older-than-aged-out",
            ReleaseReason::ListSizeExceeded => "list-size-exceeded",
            ReleaseReason::LinkDrained => "link-drained",
            ReleaseReason::Stale => "stale",
            ReleaseReason::ForceFlush => "force-flush",
        }
    }
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of hole a drop notification stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropKind {
    /// The host failed to materialize the payload (e.g. allocation failure).
    Host,
    /// Firmware consumed the frame; it was never forwarded to the host.
    Fw,
    /// The frame's link was drained before the frame could be ordered.
    LinkGone,
    /// The frame arrived older than the newest already-released timestamp.
    Stale,
}

impl DropKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DropKind::Host => "host",
            DropKind::Fw => "fw",
            DropKind::LinkGone => "link-gone",
            DropKind::Stale => "stale",
        }
    }
}

impl fmt::Display for DropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One push to the upper-layer consumer: either a frame or an explicit
/// drop notification occupying the frame's slot in the delivered stream.
///
/// Every ingested event produces exactly one `DeliveryEvent`, so the
/// consumer can account for every sequence slot without inferring holes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryEvent {
    Frame {
        frame: ManagementFrame,
        reason: ReleaseReason,
    },
    Drop {
        meta: FrameMeta,
        kind: DropKind,
        reason: ReleaseReason,
    },
}

impl DeliveryEvent {
    pub fn meta(&self) -> &FrameMeta {
        match self {
            DeliveryEvent::Frame { frame, .. } => &frame.meta,
            DeliveryEvent::Drop { meta, .. } => meta,
        }
    }

    pub fn reason(&self) -> ReleaseReason {
        match self {
            DeliveryEvent::Frame { reason, .. } => *reason,
            DeliveryEvent::Drop { reason, .. } => *reason,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.reason().is_degraded()
    }

    /// The terminal disposition this event records for its slot.
    pub fn disposition(&self) -> Disposition {
        match self {
            DeliveryEvent::Frame { reason, .. } => {
                if reason.is_degraded() {
                    Disposition::FlushedDegraded
                } else {
                    Disposition::Released
                }
            }
            DeliveryEvent::Drop { kind, .. } => match kind {
                DropKind::Host => Disposition::DroppedHost,
                DropKind::Fw => Disposition::DroppedFw,
                DropKind::LinkGone | DropKind::Stale => Disposition::FlushedDegraded,
            },
        }
    }
}

/// Terminal fate of an ingested slot, as observed by the consumer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Released,
    DroppedHost,
    DroppedFw,
    FlushedDegraded,
}

/// Hard rejections of engine calls. Everything recoverable (torn snapshot,
/// stale frame, regression) is a logged decision instead, never an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderError {
    /// The event names a link that is not registered.
    UnknownLink(LinkId),
    /// The link id is beyond the fixed snapshot arena and can never exist.
    LinkOutOfRange(LinkId),
    /// `register_link` for a link id already in the tracked set.
    LinkExists(LinkId),
    /// The same `(link, counter)` slot was inserted twice; the second copy
    /// is discarded.
    DuplicateFrame(FrameKey),
}

impl fmt::Display for ReorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReorderError::UnknownLink(link_id) => {
                write!(f, "event for unregistered {link_id}")
            }
            ReorderError::LinkOutOfRange(link_id) => {
                write!(f, "{link_id} is beyond the device's link range")
            }
            ReorderError::LinkExists(link_id) => {
                write!(f, "{link_id} is already registered")
            }
            ReorderError::DuplicateFrame(key) => {
                write!(f, "duplicate frame {key}")
            }
        }
    }
}

impl std::error::Error for ReorderError {}
