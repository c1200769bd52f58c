use mrx_engine::{DeliveryEvent, DropKind, ReorderConfig};
use mrx_testkit::Harness;

/// After a timeout flush has already released newer timestamps, a straggler
/// older than the released cutoff must not be queued (it would deliver out
/// of order); it surfaces immediately as a stale drop.
#[test]
fn scenario_straggler_older_than_flush_cutoff_drops_as_stale() {
    let mut config = ReorderConfig::strict_defaults();
    config.entry_timeout_ticks = 5;
    let mut h = Harness::new(config);
    h.register_links(&[0, 1]).unwrap();

    // Link 1 stalls; link 0's frames age out and flush degraded.
    h.fw_forwarded(0, 1, 10).unwrap();
    h.fw_forwarded(0, 2, 30).unwrap();
    h.advance(20);
    assert_eq!(h.delivered_timestamps(), vec![10, 30]);

    // Link 1 finally wakes up with a frame from before the cutoff.
    h.fw_forwarded(1, 1, 20).unwrap();

    let events = h.events();
    assert_eq!(events.len(), 3);
    match &events[2] {
        DeliveryEvent::Drop { meta, kind, .. } => {
            assert_eq!(meta.global_ts, 20);
            assert_eq!(*kind, DropKind::Stale);
        }
        other => panic!("expected stale drop, got {other:?}"),
    }
    assert_eq!(h.engine().stats().dropped_stale, 1);
    assert_eq!(h.engine().pending(), 0);

    // The straggler still has a terminal disposition: nothing silently lost.
    h.check_properties().unwrap();
}
