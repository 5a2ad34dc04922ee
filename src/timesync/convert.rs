//! `xtime`/`ustime`/`gpstime` conversions.
//!
//! `xtime` packs a 7-bit txunit, an 8-bit session nonce, and a 48-bit
//! microsecond counter (see `RAL_TXUNIT_SHIFT`/`RAL_XTSESS_SHIFT` in
//! `constants.rs`, ported from `ral.h`). Every conversion here is total: it
//! returns `None` rather than the original's `0` sentinel whenever the
//! station lacks the time-sync state needed to answer, since `0` is itself a
//! representable microsecond value and conflating the two invites silent
//! bugs (documented as a deliberate deviation from the C original).

use super::{TimeSync, TimeSyncTable};
use crate::constants::{
    PPS_VALID_INTV, RAL_TXUNIT_MASK, RAL_TXUNIT_SHIFT, RAL_XTSESS_MASK, RAL_XTSESS_SHIFT, PPM,
};

/// Extract the txunit embedded in an `xtime` value.
pub fn xtime2txunit(xtime: i64) -> u8 {
    (((xtime as u64) >> RAL_TXUNIT_SHIFT) & RAL_TXUNIT_MASK) as u8
}

/// Extract the session nonce embedded in an `xtime` value.
pub fn xtime2sess(xtime: i64) -> u8 {
    (((xtime as u64) >> RAL_XTSESS_SHIFT) & RAL_XTSESS_MASK) as u8
}

/// Round a microsecond timestamp to the nearest whole second.
pub fn ustime_round_secs(us: i64) -> i64 {
    (us + PPM / 2) / PPM * PPM
}

impl TimeSync {
    pub fn ustime2xtime(&self, ustime: i64) -> i64 {
        self.xtime + (ustime - self.ustime)
    }

    pub fn xtime2ustime(&self, xtime: i64) -> i64 {
        self.ustime + (xtime - self.xtime)
    }
}

/// Convert `ustime` (host clock) to `xtime` on `txunit`, using that unit's
/// most recent sync point. `None` if the unit has never synced.
pub fn ustime2xtime(table: &TimeSyncTable, txunit: u8, ustime: i64) -> Option<i64> {
    let sync = table.unit(txunit)?;
    if sync.xtime == 0 {
        return None;
    }
    Some(sync.ustime2xtime(ustime))
}

/// Convert `xtime` to `ustime`, resolving the owning txunit from the value
/// itself and rejecting it if the embedded session nonce is stale (the
/// concentrator restarted since).
pub fn xtime2ustime(table: &TimeSyncTable, xtime: i64) -> Option<i64> {
    let txunit = xtime2txunit(xtime);
    let sync = table.unit(txunit)?;
    if sync.xtime == 0 || xtime2sess(xtime) != xtime2sess(sync.xtime) {
        return None;
    }
    Some(sync.xtime2ustime(xtime))
}

/// Re-express `xtime` (from whichever txunit it currently encodes) in terms
/// of `dst_txunit`'s clock, via both units' shared ustime reference.
pub fn xtime2xtime(table: &TimeSyncTable, xtime: i64, dst_txunit: u8) -> Option<i64> {
    let src_txunit = xtime2txunit(xtime);
    if src_txunit == dst_txunit {
        return Some(xtime);
    }
    let src = table.unit(src_txunit)?;
    let dst = table.unit(dst_txunit)?;
    if src.xtime == 0 || dst.xtime == 0 {
        return None;
    }
    Some((dst.xtime - src.xtime) + (src.ustime - dst.ustime) + xtime)
}

/// Convert a GPS-epoch timestamp (µs since 1980-01-06 UTC) to `xtime` on
/// `txunit`, via the PPS reference point. Requires an acquired PPS pulse, a
/// known GPS offset, and that the unit's last sync is recent enough
/// (`PPS_VALID_INTV`) to trust the extrapolation.
pub fn gpstime2xtime(table: &TimeSyncTable, txunit: u8, gpstime: i64) -> Option<i64> {
    let sync = table.unit(txunit)?;
    let pps = table.pps_sync()?;
    let gps_offset = table.gps_offset()?;
    if sync.xtime == 0 || pps.pps_xtime == 0 {
        return None;
    }
    let unit0 = table.unit(0)?;
    if unit0.xtime - pps.pps_xtime > PPS_VALID_INTV {
        return None;
    }
    let xtime = gpstime - gps_offset + pps.pps_xtime;
    if txunit == 0 {
        Some(xtime)
    } else {
        xtime2xtime_via(pps, sync, xtime)
    }
}

/// Convert `xtime` (any txunit) back to a GPS-epoch timestamp, via the PPS
/// reference point on txunit#0.
pub fn xtime2gpstime(table: &TimeSyncTable, xtime: i64) -> Option<i64> {
    let pps = table.pps_sync()?;
    if pps.pps_xtime == 0 {
        return None;
    }
    let xtime0 = xtime2xtime(table, xtime, 0)?;
    if xtime0 - pps.pps_xtime > PPS_VALID_INTV {
        return None;
    }
    let gps_offset = table.gps_offset()?;
    Some(gps_offset + xtime0 - pps.pps_xtime)
}

fn xtime2xtime_via(src_sync: &TimeSync, dst_sync: &TimeSync, xtime: i64) -> Option<i64> {
    if src_sync.xtime == 0 || dst_sync.xtime == 0 {
        return None;
    }
    Some((dst_sync.xtime - src_sync.xtime) + (src_sync.ustime - dst_sync.ustime) + xtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RAL_TXUNIT_SHIFT, RAL_XTSESS_SHIFT};

    fn packed(txunit: u8, sess: u8, us: i64) -> i64 {
        ((txunit as i64) << RAL_TXUNIT_SHIFT) | ((sess as i64) << RAL_XTSESS_SHIFT) | us
    }

    #[test]
    fn txunit_and_session_round_trip() {
        let xt = packed(2, 0x5A, 123_456);
        assert_eq!(xtime2txunit(xt), 2);
        assert_eq!(xtime2sess(xt), 0x5A);
    }

    #[test]
    fn ustime_xtime_round_trip_same_unit() {
        let mut table = TimeSyncTable::new();
        table.set_unit(0, TimeSync { ustime: 1_000_000, xtime: packed(0, 1, 500_000), pps_xtime: 0 });
        let xt = ustime2xtime(&table, 0, 1_010_000).unwrap();
        let back = xtime2ustime(&table, xt).unwrap();
        assert_eq!(back, 1_010_000);
    }

    #[test]
    fn xtime2ustime_rejects_stale_session() {
        let mut table = TimeSyncTable::new();
        table.set_unit(0, TimeSync { ustime: 1_000_000, xtime: packed(0, 2, 500_000), pps_xtime: 0 });
        let stale = packed(0, 1, 500_500);
        assert!(xtime2ustime(&table, stale).is_none());
    }

    use proptest::prelude::*;
    use proptest::proptest;

    proptest! {
        /// spec.md §8 "Conversion idempotence": ustime2xtime/xtime2ustime
        /// round-trip exactly for any sync point and any offset within the
        /// 48-bit microsecond counter's room.
        #[test]
        fn ustime_xtime_round_trip(
            base_us in 0i64..1_000_000_000,
            sess in 0u8..=0xFFu8,
            delta in -10_000_000i64..10_000_000,
        ) {
            let mut table = TimeSyncTable::new();
            table.set_unit(0, TimeSync { ustime: base_us, xtime: packed(0, sess, base_us), pps_xtime: 0 });
            let u = base_us + delta;
            let xt = ustime2xtime(&table, 0, u).unwrap();
            let back = xtime2ustime(&table, xt).unwrap();
            prop_assert_eq!(back, u);
        }

        /// `xtime2xtime(xtime2xtime(x, a), b) == xtime2xtime(x, b)` whenever
        /// both hops' source/destination units have an established sync.
        #[test]
        fn xtime2xtime_is_transitive_across_units(
            us0 in 0i64..1_000_000_000,
            us1 in 0i64..1_000_000_000,
            us2 in 0i64..1_000_000_000,
            sess0 in 0u8..=0xFFu8,
            sess1 in 0u8..=0xFFu8,
            sess2 in 0u8..=0xFFu8,
            delta in -5_000_000i64..5_000_000,
        ) {
            let mut table = TimeSyncTable::new();
            table.set_unit(0, TimeSync { ustime: us0, xtime: packed(0, sess0, us0), pps_xtime: 0 });
            table.set_unit(1, TimeSync { ustime: us1, xtime: packed(1, sess1, us1), pps_xtime: 0 });
            table.set_unit(2, TimeSync { ustime: us2, xtime: packed(2, sess2, us2), pps_xtime: 0 });

            let x = packed(0, sess0, us0 + delta);
            let via_a = xtime2xtime(&table, x, 1).unwrap();
            let direct_b = xtime2xtime(&table, x, 2).unwrap();
            let via_a_then_b = xtime2xtime(&table, via_a, 2).unwrap();
            prop_assert_eq!(via_a_then_b, direct_b);
        }
    }
}
