//! Time sync with the LNS: the periodic `timesync` uplink burst/pause
//! schedule, and the candidate-second search that turns a server-reported
//! `(txtime, rxtime, gpstime)` triple into a GPS epoch offset. Ported from
//! `timesync.c`'s `onTimesyncLns`/`ts_setTimesyncLns`/`ts_processTimesyncLns`.

use crate::constants::{IPPM_SCALE, PPM, TIMESYNC_LNS_BURST, TIMESYNC_LNS_PAUSE, TIMESYNC_LNS_RETRY};

use super::convert::ustime_round_secs;
use super::TimeSyncTable;

/// Tracks how many `timesync` messages have been sent to the server since
/// the burst/pause cycle started. `0` means "not trying" — the cycle only
/// starts once an initial PPS offset has been acquired.
#[derive(Debug, Default)]
pub struct LnsTimesync {
    count: u32,
}

impl LnsTimesync {
    pub fn new() -> Self {
        LnsTimesync { count: 0 }
    }

    pub fn is_active(&self) -> bool {
        self.count > 0
    }

    pub fn start(&mut self) {
        self.count = 1;
    }

    /// Delay (µs) until the next `timesync` message should be sent, and
    /// advances the burst counter. Ten requests (`TIMESYNC_LNS_BURST`)
    /// close together, then a multi-second pause, repeating until the
    /// server resolves a GPS offset.
    pub fn next_delay(&mut self) -> i64 {
        let delay = if self.count % TIMESYNC_LNS_BURST != 0 {
            TIMESYNC_LNS_RETRY
        } else {
            TIMESYNC_LNS_PAUSE
        };
        self.count += 1;
        delay
    }

    pub fn stop(&mut self) {
        self.count = 0;
    }
}

/// Server forced a GPS time label onto a known `xtime`/ustime point
/// (the server's authoritative answer path, distinct from the candidate
/// search below). Updates the table's PPS sync point and GPS offset.
pub fn set_timesync_lns(table: &mut TimeSyncTable, xtime: i64, gpstime: i64) -> bool {
    let Some(ustime) = super::convert::xtime2ustime(table, xtime) else {
        return false;
    };
    let Some(xtime0) = super::convert::xtime2xtime(table, xtime, 0) else {
        return false;
    };
    let gps_us = gpstime.rem_euclid(PPM);
    let pps_offset = (ustime - gps_us).rem_euclid(PPM);
    table.set_pps_offset(pps_offset);
    table.set_gps_offset(gpstime);
    table.set_pps_sync(super::TimeSync {
        ustime,
        xtime: xtime0,
        pps_xtime: xtime0,
    });
    true
}

/// Infer the GPS second label for a specific PPS edge from a server
/// timesync round trip: `txtime`/`rxtime` bound the request/response on the
/// station's clock, `servertime` is the GPS time the server believes it
/// answered at. Searches every whole second between tx and rx for the one
/// consistent with `servertime`'s fractional second; only accepts a unique
/// solution.
pub fn process_timesync_lns(
    table: &mut TimeSyncTable,
    txtime: i64,
    rxtime: i64,
    servertime: i64,
) -> bool {
    if table.gps_offset().is_some() {
        return false; // already resolved
    }
    let Some(pps_offset) = table.pps_offset() else {
        return false;
    };
    if rxtime - txtime >= 2 * PPM {
        return false; // round trip too long to be useful
    }

    let txtime = txtime - pps_offset;
    let rxtime = rxtime - pps_offset;
    let tx_s = txtime.div_euclid(PPM);
    let rx_s = rxtime.div_euclid(PPM);
    let gps_us = servertime.rem_euclid(PPM);
    let gps_s = servertime - gps_us;

    let mut us_s = 0i64;
    let mut count = 0u32;
    for try_s in tx_s..=rx_s {
        let candidate = try_s * PPM + gps_us;
        if candidate >= txtime && candidate <= rxtime {
            us_s = try_s * PPM + pps_offset;
            count += 1;
        }
    }
    if count != 1 {
        return false;
    }

    let Some(sync0) = table.unit(0) else {
        return false;
    };
    let pps_xtime_inferred = sync0.ustime2xtime(us_s);
    let Some(pps_sync) = table.pps_sync() else {
        return false;
    };
    let delta = ustime_round_secs(pps_xtime_inferred - pps_sync.pps_xtime);
    let pps_xtime = pps_sync.pps_xtime + delta;
    let jitter = pps_xtime - pps_xtime_inferred;
    if jitter.abs() * IPPM_SCALE > table.drift_threshold(0) {
        return false;
    }
    table.set_gps_offset(gps_s - delta);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timesync::TimeSync;

    fn synced_table() -> TimeSyncTable {
        let mut table = TimeSyncTable::new();
        table.set_unit(0, TimeSync { ustime: 0, xtime: 0, pps_xtime: 0 });
        table.set_pps_offset(0);
        table.set_pps_sync(TimeSync { ustime: 0, xtime: 0, pps_xtime: 0 });
        table
    }

    #[test]
    fn burst_then_pause_schedule() {
        let mut lns = LnsTimesync::new();
        lns.start();
        for _ in 1..TIMESYNC_LNS_BURST {
            assert_eq!(lns.next_delay(), TIMESYNC_LNS_RETRY);
        }
        assert_eq!(lns.next_delay(), TIMESYNC_LNS_PAUSE);
    }

    #[test]
    fn already_resolved_is_a_noop() {
        let mut table = synced_table();
        table.set_gps_offset(42);
        assert!(!process_timesync_lns(&mut table, 0, 1_000, 42));
    }

    #[test]
    fn no_pps_offset_yet_is_a_noop() {
        let mut table = TimeSyncTable::new();
        assert!(!process_timesync_lns(&mut table, 0, 1_000, 42));
    }
}
