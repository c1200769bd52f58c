use mrx_schemas::Stage;
use mrx_testkit::Harness;

/// A hardware snapshot whose counter moves backwards is an anomaly; the
/// tracker keeps the newer value, so the frontier never retreats.
#[test]
fn scenario_snapshot_counter_regression_keeps_newer_state() {
    let mut h = Harness::with_defaults();
    h.register_links(&[0, 1]).unwrap();

    h.write_snapshot(1, Stage::FwForwarded, 10, 100);
    h.fw_forwarded(0, 1, 50).unwrap();
    assert_eq!(h.delivered_timestamps(), vec![50]);

    // Link 1's slot regresses to an older counter/timestamp pair.
    h.write_snapshot(1, Stage::FwForwarded, 9, 40);

    // If the regression were applied, the frontier would fall to 40 and 60
    // would be pinned; the kept value at 100 releases it.
    h.fw_forwarded(0, 2, 60).unwrap();
    assert_eq!(h.delivered_timestamps(), vec![50, 60]);
    assert!(h.engine().stats().counter_regressions >= 1);

    h.check_properties().unwrap();
}
