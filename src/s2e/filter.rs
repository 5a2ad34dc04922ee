//! Uplink pass-through filters: a `JoinEUI` disjoint-range allow-list for
//! join-requests/rejoins, and a 128-bit `NetID` bitmap for data frames.
//! Ported from `s2e.c`'s `s2e_filterDown`/`joineuiFilter`/`netidFilter`.

use crate::constants::MAX_JOINEUI_RANGES;

/// Up to [`MAX_JOINEUI_RANGES`] disjoint inclusive `JoinEUI` ranges. An
/// empty filter (as configured by a `router_config` with no ranges given)
/// passes everything through, matching the original's "no filter configured
/// means no filtering" default.
#[derive(Debug, Clone, Default)]
pub struct JoinEuiFilter {
    ranges: Vec<(u64, u64)>,
}

impl JoinEuiFilter {
    pub fn new(mut ranges: Vec<(u64, u64)>) -> Self {
        ranges.truncate(MAX_JOINEUI_RANGES);
        JoinEuiFilter { ranges }
    }

    pub fn passes(&self, join_eui: u64) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|&(lo, hi)| join_eui >= lo && join_eui <= hi)
    }
}

/// A 128-bit `NetID` bitmap (`NetID` is 7 bits, the top bits of a
/// `DevAddr`). Bit `n` set means NetID `n` is allowed through.
#[derive(Debug, Clone, Copy)]
pub struct NetIdFilter {
    bits: u128,
}

impl NetIdFilter {
    pub fn new(bits: u128) -> Self {
        NetIdFilter { bits }
    }

    /// All 128 NetIDs allowed — the default for a `router_config` that
    /// doesn't specify a NetID bitmap.
    pub fn allow_all() -> Self {
        NetIdFilter { bits: u128::MAX }
    }

    pub fn passes(&self, netid: u8) -> bool {
        netid < 128 && (self.bits & (1u128 << netid)) != 0
    }
}

impl Default for NetIdFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_joineui_filter_passes_everything() {
        let f = JoinEuiFilter::default();
        assert!(f.passes(0xFFFFFFFFFFFFFFFF));
    }

    #[test]
    fn joineui_filter_rejects_outside_ranges() {
        let f = JoinEuiFilter::new(vec![(0x10, 0x1F), (0x100, 0x1FF)]);
        assert!(f.passes(0x15));
        assert!(f.passes(0x150));
        assert!(!f.passes(0x20));
    }

    #[test]
    fn netid_bitmap_gates_by_bit() {
        let f = NetIdFilter::new(0b101);
        assert!(f.passes(0));
        assert!(!f.passes(1));
        assert!(f.passes(2));
        assert!(!f.passes(3));
    }

    #[test]
    fn netid_out_of_range_never_passes() {
        let f = NetIdFilter::allow_all();
        assert!(!f.passes(200));
    }
}
