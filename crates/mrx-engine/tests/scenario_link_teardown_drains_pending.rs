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
fn scenario_teardown_drops_pending_and_unblocks_other_links() {
    let sink = Sink::default();
    let engine = ReorderEngine::new(
        ReorderConfig::strict_defaults(),
        Arc::new(MemorySnapshotSource::new()),
        sink.clone(),
    );
    engine.register_link(LinkId(0)).unwrap();
    engine.register_link(LinkId(1)).unwrap();
    engine.register_link(LinkId(2)).unwrap();

    // Link 2 never advances, so everything is pinned behind it.
    engine.on_fw_forwarded(meta(0, 1, 10), vec![], 0).unwrap();
    engine.on_fw_forwarded(meta(1, 1, 15), vec![], 1).unwrap();
    engine.on_fw_forwarded(meta(0, 2, 20), vec![], 2).unwrap();
    assert!(sink.0.lock().unwrap().is_empty());
    assert_eq!(engine.pending(), 3);

    // Tearing link 1 down drops its pending frame and stops it from
    // constraining the frontier; link 2 still pins everything.
    engine.deregister_link(LinkId(1)).unwrap();
    {
        let events = sink.0.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        match &events[0] {
            DeliveryEvent::Drop { meta, kind, reason } => {
                assert_eq!(meta.link_id, LinkId(1));
                assert_eq!(*kind, DropKind::LinkGone);
                assert_eq!(*reason, ReleaseReason::LinkDrained);
            }
            other => panic!("expected drop notification, got {other:?}"),
        }
    }
    assert_eq!(engine.pending(), 2);

    // Tearing link 2 down removes the last constraint; link 0's frames
    // release through the ordered path.
    engine.deregister_link(LinkId(2)).unwrap();
    let events = sink.0.lock().unwrap().clone();
    let tail: Vec<u32> = events[1..].iter().map(|e| e.meta().global_ts).collect();
    assert_eq!(tail, vec![10, 20]);
    assert!(events[1..].iter().all(|e| !e.is_degraded()));
    assert_eq!(engine.pending(), 0);

    // A deregistered link cannot be deregistered twice.
    assert_eq!(
        engine.deregister_link(LinkId(1)),
        Err(ReorderError::UnknownLink(LinkId(1)))
    );

    let stats = engine.stats();
    assert_eq!(stats.dropped_link_gone, 1);
    assert_eq!(stats.released_in_order, 2);
}
