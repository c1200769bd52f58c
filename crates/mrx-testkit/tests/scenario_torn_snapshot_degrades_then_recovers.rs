use mrx_schemas::Stage;
use mrx_testkit::Harness;

/// A persistently torn snapshot slot degrades to "invalid", so the engine
/// falls back to the link's next-best stage; once the slot settles, the
/// frontier catches up.
#[test]
fn scenario_torn_forwarded_slot_falls_back_to_mac_stage() {
    let mut h = Harness::with_defaults();
    h.register_links(&[0, 1]).unwrap();

    // Link 1's MAC snapshot is consistent at 15, but its firmware-forwarded
    // slot is stuck mid-update.
    h.write_snapshot(1, Stage::MacHw, 1, 15);
    h.plant_torn_snapshot(1, Stage::FwForwarded, 9, 60);

    h.fw_forwarded(0, 1, 10).unwrap();
    h.fw_forwarded(0, 2, 20).unwrap();

    // The torn slot contributes nothing; the MAC snapshot holds the
    // frontier at 15, so only the first frame releases.
    assert_eq!(h.delivered_timestamps(), vec![10]);
    assert_eq!(h.engine().pending(), 1);

    // The update completes; the forwarded stage takes over.
    h.write_snapshot(1, Stage::FwForwarded, 9, 60);
    h.fw_forwarded(0, 3, 30).unwrap();
    assert_eq!(h.delivered_timestamps(), vec![10, 20, 30]);
    assert_eq!(h.engine().pending(), 0);

    h.check_properties().unwrap();
}
