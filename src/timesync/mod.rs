//! Time-sync engine: keeps the host clock (`ustime`), each concentrator's
//! free-running counter (`xtime`), GPS epoch time, and the LNS's notion of
//! time all reconciled. Ported from `timesync.c`.
//!
//! The engine accepts periodic `(txunit, quality, TimeSync)` samples from
//! the RAL layer (quality is a signed error estimate from the concentrator
//! driver's own cross-check) and, once a 90th-percentile quality gate
//! passes, folds them into a per-unit drift ring. Once txunit#0 locks a PPS
//! pulse, a second drift ring and offset-wobble correction track the
//! millisecond-scale relationship between the host clock and the PPS edge,
//! and an LNS timesync burst begins to resolve the absolute GPS second.

pub mod convert;
pub mod drift;
pub mod lns;
pub mod pps;

use crate::constants::{
    MAX_MCU_DRIFT_THRES, MAX_TXUNITS, MCU_DRIFT_THRES, MIN_MCU_DRIFT_THRES, PPS_DRIFT_THRES,
    QUICK_RETRIES, SYNC_QUAL_GOOD, SYNC_QUAL_THRES, TIMESYNC_RADIO_INTV, TX_MIN_GAP, MAX_PPS_ERROR,
    PPM,
};
use drift::{decode_drift_ppm, decode_ppm, encode_drift_ppm, McuDriftRing, SyncQualRing};

pub use lns::LnsTimesync;
pub use pps::PpsAlarm;

/// One concentrator's clock snapshot: host time paired with that unit's
/// free-running tick counter, and (if latched this round) the tick count at
/// which its PPS line last edged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSync {
    pub ustime: i64,
    pub xtime: i64,
    pub pps_xtime: i64,
}

struct UnitStats {
    ring: McuDriftRing,
    drift_thres: i64,
    excessive_drift_cnt: u32,
}

impl UnitStats {
    fn new() -> Self {
        UnitStats {
            ring: McuDriftRing::new(),
            drift_thres: MAX_MCU_DRIFT_THRES,
            excessive_drift_cnt: 0,
        }
    }
}

/// Result of folding one `(txunit, quality, TimeSync)` sample into the
/// engine. `delay` is how long to wait before the next radio-side sample;
/// the remaining fields are notable state transitions the caller may want
/// to log or act on (e.g. kick off the LNS timesync burst).
#[derive(Debug, Clone, Copy, Default)]
pub struct TimesyncOutcome {
    pub delay: i64,
    pub rejected: bool,
    pub pps_acquired: bool,
    pub pps_offset_changed: bool,
    pub no_pps_secs: Option<i64>,
    pub start_lns: bool,
}

pub struct TimeSyncTable {
    units: [TimeSync; MAX_TXUNITS],
    stats: Vec<UnitStats>,
    pps_drifts: McuDriftRing,
    #[allow(dead_code)]
    pps_drift_thres: i64,
    pps_offset: Option<i64>,
    gps_offset: Option<i64>,
    pps_sync: Option<TimeSync>,
    sync_wobble: i8,
    sync_qual: SyncQualRing,
    sync_qual_thres: i64,
    pps_alarm: PpsAlarm,
}

impl TimeSyncTable {
    pub fn new() -> Self {
        TimeSyncTable {
            units: [TimeSync::default(); MAX_TXUNITS],
            stats: (0..MAX_TXUNITS).map(|_| UnitStats::new()).collect(),
            pps_drifts: McuDriftRing::new(),
            pps_drift_thres: 0,
            pps_offset: None,
            gps_offset: None,
            pps_sync: None,
            sync_wobble: -1,
            sync_qual: SyncQualRing::new(),
            sync_qual_thres: i64::MAX,
            pps_alarm: PpsAlarm::new(),
        }
    }

    pub fn unit(&self, txunit: u8) -> Option<&TimeSync> {
        self.units.get(txunit as usize)
    }

    pub fn set_unit(&mut self, txunit: u8, ts: TimeSync) {
        self.units[txunit as usize] = ts;
    }

    pub fn pps_sync(&self) -> Option<&TimeSync> {
        self.pps_sync.as_ref()
    }

    pub fn set_pps_sync(&mut self, ts: TimeSync) {
        self.pps_sync = Some(ts);
    }

    pub fn gps_offset(&self) -> Option<i64> {
        self.gps_offset
    }

    pub fn set_gps_offset(&mut self, v: i64) {
        self.gps_offset = Some(v);
    }

    pub fn pps_offset(&self) -> Option<i64> {
        self.pps_offset
    }

    pub fn set_pps_offset(&mut self, v: i64) {
        self.pps_offset = Some(v);
    }

    pub fn drift_threshold(&self, txunit: u8) -> i64 {
        self.stats[txunit as usize].drift_thres
    }

    /// Fold a fresh `(ustime, xtime, pps_xtime)` sample from `txunit` into
    /// the engine. Mirrors `ts_updateTimesync`: first the sample passes a
    /// quantile-based acceptance gate on `quality`, then (if the unit has a
    /// prior sample) a drift ratio is derived, checked against that unit's
    /// own adaptive threshold, and folded into the drift ring; only
    /// txunit#0 additionally tracks the PPS pulse and feeds the LNS
    /// timesync state machine.
    pub fn update_timesync(&mut self, txunit: u8, quality: i32, curr: TimeSync) -> TimesyncOutcome {
        let mut out = TimesyncOutcome {
            delay: TIMESYNC_RADIO_INTV,
            ..Default::default()
        };

        if self.sync_qual.push(quality as i64) {
            let thres = self.sync_qual.quantile_abs(SYNC_QUAL_THRES);
            self.sync_qual_thres = SYNC_QUAL_GOOD.max(thres.abs());
        }
        if (quality as i64).abs() > self.sync_qual_thres {
            out.rejected = true;
            return out;
        }

        let last = self.units[txunit as usize];
        if last.ustime == 0 {
            self.units[txunit as usize] = curr;
            return out;
        }

        let dus = curr.ustime - last.ustime;
        let dxc = curr.xtime - last.xtime;
        if dxc <= 0 {
            return out; // counter not ticking, or went backwards
        }
        if dus < TIMESYNC_RADIO_INTV / 5 {
            return out; // samples too close together to derive a useful ratio
        }

        let drift_ppm = encode_drift_ppm(dus as f64 / dxc as f64);
        let stats = &mut self.stats[txunit as usize];
        let just_wrapped = stats.ring.push(drift_ppm);
        if just_wrapped {
            let thres = stats.ring.quantile_abs(MCU_DRIFT_THRES);
            stats.drift_thres = MIN_MCU_DRIFT_THRES.max(MAX_MCU_DRIFT_THRES.min(thres.abs()));
            let _mean_ppm = decode_ppm(stats.ring.sum() / crate::constants::N_DRIFTS as i64);
        }
        if drift_ppm.abs() > stats.drift_thres {
            stats.excessive_drift_cnt += 1;
            if stats.excessive_drift_cnt >= 2 * QUICK_RETRIES {
                stats.drift_thres = MAX_MCU_DRIFT_THRES;
            }
            self.units[txunit as usize] = curr;
            out.delay = TIMESYNC_RADIO_INTV / 2;
            return out;
        }
        stats.excessive_drift_cnt = 0;

        if txunit != 0 {
            self.units[txunit as usize] = curr;
            return out;
        }

        if let Some(pps) = self.pps_sync {
            if pps.pps_xtime != 0 {
                let no_pps_us = curr.xtime - pps.pps_xtime;
                if let Some(_fired_at) = self.pps_alarm.check(no_pps_us) {
                    out.no_pps_secs = Some((no_pps_us + PPM / 2) / PPM);
                }
            }
        }

        if last.pps_xtime == 0 || curr.pps_xtime == 0 {
            self.units[txunit as usize] = curr;
            return out;
        }
        if curr.xtime - curr.pps_xtime > PPM + TX_MIN_GAP {
            self.units[txunit as usize] = curr;
            return out; // no PPS edge near this sample
        }
        let mut err = (curr.pps_xtime - last.pps_xtime) % PPM;
        if err < 0 {
            err += PPM;
        }
        if err > MAX_PPS_ERROR && err < PPM - MAX_PPS_ERROR {
            self.units[txunit as usize] = curr;
            return out; // consecutive PPS samples don't land ~1s apart
        }

        let had_pps = self.pps_sync.map(|p| p.pps_xtime != 0).unwrap_or(false);
        if !had_pps {
            out.pps_acquired = true;
        }

        let pps_drift_ratio = (curr.pps_xtime - last.pps_xtime) as f64
            / ((curr.pps_xtime - last.pps_xtime + PPM / 2) / PPM * PPM) as f64;
        if self.pps_drifts.push(encode_drift_ppm(pps_drift_ratio)) {
            self.pps_drift_thres = self.pps_drifts.quantile_abs(PPS_DRIFT_THRES);
        }

        let pps_ustime = curr.xtime2ustime(curr.pps_xtime);
        let off = pps_ustime.rem_euclid(PPM);
        match self.pps_offset {
            None => {
                self.pps_offset = Some(off);
                out.start_lns = true;
            }
            Some(prev) if (prev - off).abs() > (self.stats[0].drift_thres * TIMESYNC_RADIO_INTV) / PPM => {
                self.pps_offset = Some(off);
                out.pps_offset_changed = true;
            }
            _ => {}
        }

        self.sync_wobble *= -1;
        if let Some(gps_offset) = self.gps_offset {
            let prev_pps_xtime = self.pps_sync.map(|p| p.pps_xtime).unwrap_or(0);
            self.gps_offset = Some(gps_offset + convert::ustime_round_secs(curr.pps_xtime - prev_pps_xtime));
        }
        self.pps_sync = Some(curr);
        self.units[txunit as usize] = curr;
        out
    }

    /// `ts_normalizeTimespanMCU`: scale a host-clock timespan by the mean
    /// MCU/concentrator drift so it reflects elapsed concentrator time.
    pub fn normalize_timespan_mcu(&self, timespan: i64) -> i64 {
        let mean = self.stats[0].ring.sum() as f64 / crate::constants::N_DRIFTS as f64;
        (timespan as f64 / decode_drift_ppm(mean.round() as i64)).round() as i64
    }
}

impl Default for TimeSyncTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_just_seeds_the_unit() {
        let mut table = TimeSyncTable::new();
        let out = table.update_timesync(0, 0, TimeSync { ustime: 1_000_000, xtime: 500_000, pps_xtime: 0 });
        assert_eq!(out.delay, TIMESYNC_RADIO_INTV);
        assert_eq!(table.unit(0).unwrap().ustime, 1_000_000);
    }

    #[test]
    fn excessive_quality_is_rejected() {
        let mut table = TimeSyncTable::new();
        for _ in 0..30 {
            table.update_timesync(0, 5, TimeSync { ustime: 0, xtime: 0, pps_xtime: 0 });
        }
        let out = table.update_timesync(0, 10_000, TimeSync { ustime: 0, xtime: 0, pps_xtime: 0 });
        assert!(out.rejected);
    }

    #[test]
    fn non_advancing_counter_is_ignored() {
        let mut table = TimeSyncTable::new();
        table.update_timesync(0, 0, TimeSync { ustime: 0, xtime: 100, pps_xtime: 0 });
        let out = table.update_timesync(0, 0, TimeSync { ustime: 1_000_000, xtime: 100, pps_xtime: 0 });
        assert_eq!(out.delay, TIMESYNC_RADIO_INTV);
        assert_eq!(table.unit(0).unwrap().xtime, 100);
    }

    #[test]
    fn first_pps_pair_acquires_lock() {
        let mut table = TimeSyncTable::new();
        table.update_timesync(
            0,
            0,
            TimeSync { ustime: 0, xtime: 1_000_000, pps_xtime: 1_000_000 },
        );
        let out = table.update_timesync(
            0,
            0,
            TimeSync { ustime: TIMESYNC_RADIO_INTV, xtime: 1_000_000 + TIMESYNC_RADIO_INTV, pps_xtime: 1_000_000 + PPM },
        );
        assert!(out.pps_acquired);
        assert!(table.pps_offset().is_some());
    }
}
