//! Per-link bookkeeping: the latest valid snapshot per stage and the last
//! counter delivered downstream for each link.

use std::collections::BTreeMap;

use mrx_schemas::{seq, LinkId, SnapshotValue, Stage};
use tracing::warn;

use crate::types::ReorderError;

/// Outcome of a tracker update. Regressions and invalid reads are decisions,
/// not errors; stored state never moves backwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The stored snapshot advanced (or was set for the first time).
    Applied,
    /// The incoming value was `Invalid`; stored state kept.
    IgnoredInvalid,
    /// The incoming counter was behind the stored one; stored state kept.
    Regression,
}

/// State for one tracked link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkState {
    stages: [SnapshotValue; Stage::ALL.len()],
    /// Counter of the last entry for this link handed to the consumer.
    last_delivered_ctr: Option<u16>,
    /// A drained link contributes no further frames and is skipped by
    /// frontier evaluation.
    drained: bool,
}

impl LinkState {
    fn new() -> Self {
        Self {
            stages: [SnapshotValue::Invalid; Stage::ALL.len()],
            last_delivered_ctr: None,
            drained: false,
        }
    }
}

/// Arena of link slots, keyed by stable [`LinkId`].
///
/// Links are created on explicit registration and removed only after their
/// pending frames are drained; frontier evaluation iterates this set, so
/// registration and removal must happen under the same lock as evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkTracker {
    links: BTreeMap<LinkId, LinkState>,
}

impl LinkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, link_id: LinkId) -> Result<(), ReorderError> {
        if self.links.contains_key(&link_id) {
            return Err(ReorderError::LinkExists(link_id));
        }
        self.links.insert(link_id, LinkState::new());
        Ok(())
    }

    pub fn remove(&mut self, link_id: LinkId) -> Result<(), ReorderError> {
        self.links
            .remove(&link_id)
            .map(|_| ())
            .ok_or(ReorderError::UnknownLink(link_id))
    }

    pub fn contains(&self, link_id: LinkId) -> bool {
        self.links.contains_key(&link_id)
    }

    /// Record a snapshot observation for `(link_id, stage)`.
    ///
    /// Monotonic: an observation whose counter is behind the stored one is
    /// logged as a counter regression and ignored.
    pub fn update(
        &mut self,
        link_id: LinkId,
        stage: Stage,
        value: SnapshotValue,
    ) -> Result<UpdateOutcome, ReorderError> {
        let state = self
            .links
            .get_mut(&link_id)
            .ok_or(ReorderError::UnknownLink(link_id))?;

        let incoming = match value.params() {
            Some(p) => *p,
            None => return Ok(UpdateOutcome::IgnoredInvalid),
        };

        let slot = &mut state.stages[stage as usize];
        if let Some(stored) = slot.params() {
            if seq::pkt_ctr_delta(incoming.mgmt_pkt_ctr, stored.mgmt_pkt_ctr) < 0 {
                warn!(
                    %link_id,
                    %stage,
                    stored_ctr = stored.mgmt_pkt_ctr,
                    incoming_ctr = incoming.mgmt_pkt_ctr,
                    "counter regression, keeping stored snapshot"
                );
                return Ok(UpdateOutcome::Regression);
            }
        }

        *slot = SnapshotValue::Valid(incoming);
        Ok(UpdateOutcome::Applied)
    }

    /// The latest stored snapshot for `(link_id, stage)`.
    pub fn latest(&self, link_id: LinkId, stage: Stage) -> Result<SnapshotValue, ReorderError> {
        self.links
            .get(&link_id)
            .map(|s| s.stages[stage as usize])
            .ok_or(ReorderError::UnknownLink(link_id))
    }

    pub fn mark_drained(&mut self, link_id: LinkId) -> Result<(), ReorderError> {
        let state = self
            .links
            .get_mut(&link_id)
            .ok_or(ReorderError::UnknownLink(link_id))?;
        state.drained = true;
        Ok(())
    }

    pub fn is_drained(&self, link_id: LinkId) -> Result<bool, ReorderError> {
        self.links
            .get(&link_id)
            .map(|s| s.drained)
            .ok_or(ReorderError::UnknownLink(link_id))
    }

    pub fn last_delivered_ctr(&self, link_id: LinkId) -> Option<u16> {
        self.links.get(&link_id).and_then(|s| s.last_delivered_ctr)
    }

    /// Record that an entry with this counter was handed downstream.
    pub fn note_delivered(&mut self, link_id: LinkId, mgmt_pkt_ctr: u16) {
        if let Some(state) = self.links.get_mut(&link_id) {
            match state.last_delivered_ctr {
                Some(last) if seq::pkt_ctr_delta(mgmt_pkt_ctr, last) <= 0 => {}
                _ => state.last_delivered_ctr = Some(mgmt_pkt_ctr),
            }
        }
    }

    /// Registered links, in id order.
    pub fn link_ids(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.links.keys().copied()
    }

    /// Links that still participate in frontier evaluation.
    pub fn live_links(&self) -> impl Iterator<Item = (LinkId, &LinkState)> + '_ {
        self.links
            .iter()
            .filter(|(_, s)| !s.drained)
            .map(|(id, s)| (*id, s))
    }

    pub(crate) fn stage_snapshot(state: &LinkState, stage: Stage) -> SnapshotValue {
        state.stages[stage as usize]
    }
}
