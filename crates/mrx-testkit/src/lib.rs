//! mrx-testkit
//!
//! Deterministic multi-link harness for exercising the reorder engine end
//! to end: a scripted event driver over an in-memory snapshot source, a
//! recording consumer, and checkers for the two load-bearing properties
//! (ordered-path monotonicity and no silent loss). The cross-crate
//! scenario suite lives under `tests/`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Once};

use anyhow::{bail, Result};
use mrx_engine::{
    DeliveryEvent, FrameConsumer, ReleaseReason, ReorderConfig, ReorderEngine, ReorderError,
};
use mrx_schemas::{seq, FrameKey, FrameMeta, LinkId, SnapshotParams, Stage};
use mrx_snapshot::{words, MemorySnapshotSource};

static INIT: Once = Once::new();

/// Install a fmt subscriber honoring `RUST_LOG`. Safe to call from every
/// test; only the first call wins.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// Consumer that records every delivery, shareable with the test body.
#[derive(Clone, Default)]
pub struct RecordingConsumer {
    events: Arc<Mutex<Vec<DeliveryEvent>>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn timestamps(&self) -> Vec<u32> {
        self.events().iter().map(|e| e.meta().global_ts).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameConsumer for RecordingConsumer {
    fn deliver(&mut self, event: DeliveryEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Deterministic stand-in for a management frame payload.
fn payload(link: u8, ctr: u16) -> Vec<u8> {
    vec![0xd0, link, (ctr >> 8) as u8, ctr as u8]
}

/// A scripted multi-link device: the engine under test, its snapshot
/// memory, the recording consumer, and a tick counter the script advances.
pub struct Harness {
    snapshots: Arc<MemorySnapshotSource>,
    engine: ReorderEngine<RecordingConsumer>,
    sink: RecordingConsumer,
    now_tick: u64,
    ingested: Vec<FrameKey>,
}

impl Harness {
    pub fn new(config: ReorderConfig) -> Self {
        init_tracing();
        let snapshots = Arc::new(MemorySnapshotSource::new());
        let sink = RecordingConsumer::new();
        let engine = ReorderEngine::new(config, snapshots.clone(), sink.clone());
        Self {
            snapshots,
            engine,
            sink,
            now_tick: 0,
            ingested: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ReorderConfig::strict_defaults())
    }

    pub fn engine(&self) -> &ReorderEngine<RecordingConsumer> {
        &self.engine
    }

    pub fn register_links(&self, ids: &[u8]) -> Result<(), ReorderError> {
        for id in ids {
            self.engine.register_link(LinkId(*id))?;
        }
        Ok(())
    }

    fn meta(link: u8, ctr: u16, ts: u32) -> FrameMeta {
        FrameMeta {
            link_id: LinkId(link),
            mgmt_pkt_ctr: ctr,
            global_ts: ts,
        }
    }

    pub fn fw_forwarded(&mut self, link: u8, ctr: u16, ts: u32) -> Result<(), ReorderError> {
        self.now_tick += 1;
        let meta = Self::meta(link, ctr, ts);
        let result = self
            .engine
            .on_fw_forwarded(meta, payload(link, ctr), self.now_tick);
        if result.is_ok() {
            self.ingested.push(meta.key());
        }
        result
    }

    pub fn fw_consumed(&mut self, link: u8, ctr: u16, ts: u32) -> Result<(), ReorderError> {
        self.now_tick += 1;
        let meta = Self::meta(link, ctr, ts);
        let result = self.engine.on_fw_consumed(meta, self.now_tick);
        if result.is_ok() {
            self.ingested.push(meta.key());
        }
        result
    }

    pub fn host_drop(&mut self, link: u8, ctr: u16, ts: u32) -> Result<(), ReorderError> {
        self.now_tick += 1;
        let meta = Self::meta(link, ctr, ts);
        let result = self.engine.on_host_drop(meta, self.now_tick);
        if result.is_ok() {
            self.ingested.push(meta.key());
        }
        result
    }

    /// Publish a consistent hardware snapshot for `(link, stage)`.
    pub fn write_snapshot(&self, link: u8, stage: Stage, ctr: u16, ts: u32) {
        self.snapshots.write(
            LinkId(link),
            stage,
            SnapshotParams {
                mgmt_pkt_ctr: ctr,
                global_ts: ts,
            },
        );
    }

    /// Plant a persistently torn word pair for `(link, stage)`: the low word
    /// of one snapshot with the high word of its predecessor.
    pub fn plant_torn_snapshot(&self, link: u8, stage: Stage, ctr: u16, ts: u32) {
        let (low, _) = words::pack(SnapshotParams {
            mgmt_pkt_ctr: ctr,
            global_ts: ts,
        });
        let (_, high) = words::pack(SnapshotParams {
            mgmt_pkt_ctr: ctr.wrapping_sub(1),
            global_ts: ts.wrapping_sub(1),
        });
        self.snapshots.write_raw(LinkId(link), stage, low, high);
    }

    /// Unmap a link's snapshot memory, as a hardware detach would.
    pub fn link_gone(&self, link: u8) {
        self.snapshots.mark_link_gone(LinkId(link));
    }

    /// Advance engine time by `ticks` and run the timeout handler.
    pub fn advance(&mut self, ticks: u64) {
        self.now_tick += ticks;
        self.engine.on_tick(self.now_tick);
    }

    /// Flush everything still pending so every ingested slot is terminal.
    pub fn finish(&self) {
        self.engine.force_flush();
    }

    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.sink.events()
    }

    pub fn delivered_timestamps(&self) -> Vec<u32> {
        self.sink.timestamps()
    }

    /// Run both property checkers over everything delivered so far.
    pub fn check_properties(&self) -> Result<()> {
        let events = self.events();
        check_ordered_path_monotonic(&events)?;
        check_no_silent_loss(&self.ingested, &events)
    }
}

/// Ordered-path deliveries (not degraded, not pass-through) must carry
/// non-decreasing global timestamps, modulo wraparound.
pub fn check_ordered_path_monotonic(events: &[DeliveryEvent]) -> Result<()> {
    let mut last: Option<u32> = None;
    for event in events {
        if event.is_degraded() || event.reason() == ReleaseReason::PassThrough {
            continue;
        }
        let ts = event.meta().global_ts;
        if let Some(prev) = last {
            if !seq::global_ts_gte(ts, prev) {
                bail!(
                    "ordered path went backwards: {} delivered after timestamp {}",
                    event.meta(),
                    prev
                );
            }
        }
        last = Some(ts);
    }
    Ok(())
}

/// Every ingested slot must surface exactly once in the delivered stream,
/// as a frame or as an explicit drop.
pub fn check_no_silent_loss(ingested: &[FrameKey], events: &[DeliveryEvent]) -> Result<()> {
    let mut seen: BTreeMap<FrameKey, usize> = BTreeMap::new();
    for event in events {
        *seen.entry(event.meta().key()).or_default() += 1;
    }
    for key in ingested {
        match seen.get(key) {
            Some(1) => {}
            Some(n) => bail!("slot {key} delivered {n} times"),
            None => bail!("slot {key} was silently lost"),
        }
    }
    Ok(())
}
