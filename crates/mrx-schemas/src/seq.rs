//! Wraparound-safe comparisons for packet counters and global timestamps.
//!
//! Both counters are free-running and wrap at the range of their integer
//! type, so raw magnitude comparison is wrong near the wrap point. The
//! hardware guarantees that any two values being compared are never further
//! apart than half the range, which lets the classic modular (signed
//! difference) trick recover the true ordering.

/// Half the range of the u16 management packet counter.
pub const PKT_CTR_HALF_RANGE: u16 = 0x8000;

/// Half the range of the u32 global timestamp.
pub const GLOBAL_TS_HALF_RANGE: u32 = 0x8000_0000;

/// `true` iff packet counter `a` is greater than or equal to `b`, modulo
/// wraparound.
#[inline]
pub fn pkt_ctr_gte(a: u16, b: u16) -> bool {
    a.wrapping_sub(b) <= PKT_CTR_HALF_RANGE
}

/// Signed difference `a - b` of two packet counters, modulo wraparound.
///
/// A delta greater than half the range means `a` is actually behind `b`;
/// subtracting the full range yields the correct negative result.
#[inline]
pub fn pkt_ctr_delta(a: u16, b: u16) -> i32 {
    let delta = a.wrapping_sub(b) as i32;
    if delta > PKT_CTR_HALF_RANGE as i32 {
        delta - 0x1_0000
    } else {
        delta
    }
}

/// `true` iff global timestamp `a` is greater than or equal to `b`, modulo
/// wraparound.
#[inline]
pub fn global_ts_gte(a: u32, b: u32) -> bool {
    a.wrapping_sub(b) <= GLOBAL_TS_HALF_RANGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkt_ctr_gte_plain() {
        assert!(pkt_ctr_gte(10, 10));
        assert!(pkt_ctr_gte(11, 10));
        assert!(!pkt_ctr_gte(9, 10));
    }

    #[test]
    fn pkt_ctr_gte_across_wrap() {
        assert!(pkt_ctr_gte(5, 0xfff0));
        assert!(!pkt_ctr_gte(0xfff0, 5));
    }

    #[test]
    fn pkt_ctr_delta_plain_and_wrapped() {
        assert_eq!(pkt_ctr_delta(10, 7), 3);
        assert_eq!(pkt_ctr_delta(7, 10), -3);
        assert_eq!(pkt_ctr_delta(2, 0xfffe), 4);
        assert_eq!(pkt_ctr_delta(0xfffe, 2), -4);
        assert_eq!(pkt_ctr_delta(42, 42), 0);
    }

    #[test]
    fn global_ts_gte_plain() {
        assert!(global_ts_gte(1000, 1000));
        assert!(global_ts_gte(1001, 1000));
        assert!(!global_ts_gte(999, 1000));
    }

    #[test]
    fn global_ts_gte_across_wrap() {
        assert!(global_ts_gte(3, 0xffff_fff0));
        assert!(!global_ts_gte(0xffff_fff0, 3));
    }
}
