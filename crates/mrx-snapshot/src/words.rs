//! Bit layout of the shared snapshot word pair.
//!
//! Layout (per hardware generation currently supported):
//!
//! | word | bits    | field                               |
//! |------|---------|-------------------------------------|
//! | low  | 0       | valid                               |
//! | low  | 1..=16  | mgmt_pkt_ctr (16 bits)              |
//! | low  | 17..=31 | global_ts bits 0..=14               |
//! | high | 0..=16  | global_ts bits 15..=31              |
//! | high | 17..=31 | mgmt_pkt_ctr bits 0..=14, redundant |
//!
//! The redundant counter copy is only 15 bits wide, so the tear check
//! compares the low 15 bits of the counter. The target writes the two words
//! in sequence; a host read that straddles the update sees a counter /
//! redundant-counter mismatch and must retry.

use mrx_schemas::{SnapshotParams, SnapshotValue};

const LOW_VALID_POS: u32 = 0;
const LOW_VALID_SIZE: u32 = 1;
const LOW_PKT_CTR_POS: u32 = 1;
const LOW_PKT_CTR_SIZE: u32 = 16;
const LOW_GLOBAL_TS_POS: u32 = 17;
const LOW_GLOBAL_TS_SIZE: u32 = 15;

const HIGH_GLOBAL_TS_POS: u32 = 0;
const HIGH_GLOBAL_TS_SIZE: u32 = 17;
const HIGH_PKT_CTR_REDUNDANT_POS: u32 = 17;
const HIGH_PKT_CTR_REDUNDANT_SIZE: u32 = 15;

/// Mask of the counter bits covered by the redundant copy.
const PKT_CTR_REDUNDANT_MASK: u32 = (1 << HIGH_PKT_CTR_REDUNDANT_SIZE) - 1;

#[inline]
fn get_bits(word: u32, pos: u32, size: u32) -> u32 {
    (word >> pos) & ((1u32 << size) - 1)
}

#[inline]
fn set_bits(word: &mut u32, pos: u32, size: u32, value: u32) {
    let mask = ((1u32 << size) - 1) << pos;
    *word = (*word & !mask) | ((value << pos) & mask);
}

/// Interpret a raw snapshot word pair.
///
/// - `None`: the read was torn (counter and redundant copy disagree);
///   the caller should retry.
/// - `Some(SnapshotValue::Invalid)`: nothing captured yet for this slot.
/// - `Some(SnapshotValue::Valid(_))`: a consistent snapshot.
pub fn validate(low: u32, high: u32) -> Option<SnapshotValue> {
    if get_bits(low, LOW_VALID_POS, LOW_VALID_SIZE) == 0 {
        return Some(SnapshotValue::Invalid);
    }

    let mgmt_pkt_ctr = get_bits(low, LOW_PKT_CTR_POS, LOW_PKT_CTR_SIZE) as u16;
    let redundant = get_bits(high, HIGH_PKT_CTR_REDUNDANT_POS, HIGH_PKT_CTR_REDUNDANT_SIZE);

    if (mgmt_pkt_ctr as u32) & PKT_CTR_REDUNDANT_MASK != redundant {
        return None;
    }

    let ts_low = get_bits(low, LOW_GLOBAL_TS_POS, LOW_GLOBAL_TS_SIZE);
    let ts_high = get_bits(high, HIGH_GLOBAL_TS_POS, HIGH_GLOBAL_TS_SIZE);
    let global_ts = ts_low | (ts_high << LOW_GLOBAL_TS_SIZE);

    Some(SnapshotValue::Valid(SnapshotParams {
        mgmt_pkt_ctr,
        global_ts,
    }))
}

/// Encode a snapshot the way the target writes it (valid bit set).
///
/// Used by the in-memory source and by tests; the driver itself never writes
/// a shared snapshot.
pub fn pack(params: SnapshotParams) -> (u32, u32) {
    let mut low = 0u32;
    let mut high = 0u32;

    set_bits(&mut low, LOW_VALID_POS, LOW_VALID_SIZE, 1);
    set_bits(
        &mut low,
        LOW_PKT_CTR_POS,
        LOW_PKT_CTR_SIZE,
        params.mgmt_pkt_ctr as u32,
    );
    set_bits(&mut low, LOW_GLOBAL_TS_POS, LOW_GLOBAL_TS_SIZE, params.global_ts);

    set_bits(
        &mut high,
        HIGH_GLOBAL_TS_POS,
        HIGH_GLOBAL_TS_SIZE,
        params.global_ts >> LOW_GLOBAL_TS_SIZE,
    );
    set_bits(
        &mut high,
        HIGH_PKT_CTR_REDUNDANT_POS,
        HIGH_PKT_CTR_REDUNDANT_SIZE,
        params.mgmt_pkt_ctr as u32 & PKT_CTR_REDUNDANT_MASK,
    );

    (low, high)
}

/// The word pair of a slot nothing has been captured into.
pub const EMPTY_WORDS: (u32, u32) = (0, 0);
