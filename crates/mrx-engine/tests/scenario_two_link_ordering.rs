use std::sync::{Arc, Mutex};

use mrx_engine::*;
use mrx_schemas::{FrameMeta, LinkId};
use mrx_snapshot::MemorySnapshotSource;

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<DeliveryEvent>>>);

impl FrameConsumer for Sink {
    fn deliver(&mut self, event: DeliveryEvent) {
        self.0.lock().unwrap().push(event);
    }
}

fn meta(link: u8, ctr: u16, ts: u32) -> FrameMeta {
    FrameMeta {
        link_id: LinkId(link),
        mgmt_pkt_ctr: ctr,
        global_ts: ts,
    }
}

#[test]
fn scenario_two_links_interleave_in_global_timestamp_order() {
    let sink = Sink::default();
    let engine = ReorderEngine::new(
        ReorderConfig::strict_defaults(),
        Arc::new(MemorySnapshotSource::new()),
        sink.clone(),
    );
    engine.register_link(LinkId(0)).unwrap();
    engine.register_link(LinkId(1)).unwrap();

    // Link 0 emits [10, 20, 30], link 1 emits [15, 25], interleaved.
    engine.on_fw_forwarded(meta(0, 1, 10), vec![10], 0).unwrap();
    engine.on_fw_forwarded(meta(1, 1, 15), vec![15], 1).unwrap();
    engine.on_fw_forwarded(meta(0, 2, 20), vec![20], 2).unwrap();
    engine.on_fw_forwarded(meta(1, 2, 25), vec![25], 3).unwrap();
    engine.on_fw_forwarded(meta(0, 3, 30), vec![30], 4).unwrap();

    // With link 1 at 25 and link 0 at 30, everything up to 25 is proven;
    // 30 must still wait for link 1.
    let delivered: Vec<u32> = sink
        .0
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.meta().global_ts)
        .collect();
    assert_eq!(delivered, vec![10, 15, 20, 25]);
    assert!(sink.0.lock().unwrap().iter().all(|e| !e.is_degraded()));
    assert_eq!(engine.pending(), 1);

    // Draining link 1 lifts the constraint and 30 releases in order.
    engine.deregister_link(LinkId(1)).unwrap();
    let delivered: Vec<u32> = sink
        .0
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.meta().global_ts)
        .collect();
    assert_eq!(delivered, vec![10, 15, 20, 25, 30]);
    assert_eq!(engine.pending(), 0);

    let stats = engine.stats();
    assert_eq!(stats.ingested_frames, 5);
    assert_eq!(stats.released_in_order, 5);
    assert_eq!(stats.released_degraded, 0);
}
