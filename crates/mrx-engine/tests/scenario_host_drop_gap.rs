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
fn scenario_host_drop_occupies_its_slot_without_disturbing_order() {
    let sink = Sink::default();
    let engine = ReorderEngine::new(
        ReorderConfig::strict_defaults(),
        Arc::new(MemorySnapshotSource::new()),
        sink.clone(),
    );
    engine.register_link(LinkId(0)).unwrap();
    engine.register_link(LinkId(1)).unwrap();

    // Link 0's frame at counter 5 never materialized on the host; the event
    // still advances link 0 and occupies its ordering slot.
    engine.on_fw_forwarded(meta(0, 4, 10), vec![], 0).unwrap();
    engine.on_host_drop(meta(0, 5, 20), 1).unwrap();
    engine.on_fw_forwarded(meta(1, 1, 15), vec![], 2).unwrap();
    engine.on_fw_forwarded(meta(1, 2, 25), vec![], 3).unwrap();
    engine.on_fw_forwarded(meta(0, 6, 30), vec![], 4).unwrap();

    let events = sink.0.lock().unwrap().clone();
    let delivered: Vec<u32> = events.iter().map(|e| e.meta().global_ts).collect();
    assert_eq!(delivered, vec![10, 15, 20, 25]);

    // The gap arrives as an explicit ordered drop, not a missing slot.
    match &events[2] {
        DeliveryEvent::Drop { meta, kind, reason } => {
            assert_eq!(meta.mgmt_pkt_ctr, 5);
            assert_eq!(*kind, DropKind::Host);
            assert_eq!(*reason, ReleaseReason::FrontierReached);
        }
        other => panic!("expected drop notification, got {other:?}"),
    }

    let stats = engine.stats();
    assert_eq!(stats.ingested_host_drops, 1);
    assert_eq!(stats.dropped_host, 1);
    assert_eq!(stats.released_in_order, 3);
}
