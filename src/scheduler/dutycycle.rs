//! Regional duty-cycle and LBT bookkeeping. Ported from `s2e.c`'s
//! `freq2band`/`update_DC`/`s2e_canTxEU868`/`s2e_canTxPerChnlDC`.
//!
//! Three policies exist, selected per `Region` at `router_config` time:
//! EU868's three sub-bands (0.1%/1%/10% duty cycle, tracked by frequency
//! band rather than channel), AS923/KR920's per-channel duty cycle plus
//! listen-before-talk, and US915/AU915's no restriction at all. A slot
//! pinned to [`USTIME_MIN`]/[`USTIME_MAX`] is permanently free/blocked and
//! is never advanced by a transmission — that's how "duty cycle disabled"
//! and "this channel may never transmit" are expressed without a separate
//! enabled flag.

use crate::constants::{MAX_DNCHNLS, MAX_TXUNITS, USTIME_MAX, USTIME_MIN};

/// EU868 sub-bands, by duty-cycle rate: 869.4-869.65MHz allows 10% (rate
/// divisor 10), the two 1% bands use divisor 100, everything else is 0.1%
/// (divisor 1000, "milli").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eu868Band {
    Deci = 0,
    Centi = 1,
    Milli = 2,
}

const EU868_BAND_RATE: [i64; 3] = [10, 100, 1000];

pub fn freq2band(freq_hz: u32) -> Eu868Band {
    if (869_400_000..=869_650_000).contains(&freq_hz) {
        Eu868Band::Deci
    } else if (868_000_000..=868_600_000).contains(&freq_hz) || (869_700_000..=870_000_000).contains(&freq_hz) {
        Eu868Band::Centi
    } else {
        Eu868Band::Milli
    }
}

/// Per-antenna duty-cycle state. `per_chnl` has one slot per tracked
/// downlink frequency plus a shared overflow slot at index `MAX_DNCHNLS`
/// for channels beyond that table's capacity.
#[derive(Debug, Clone)]
pub struct DutyCycleState {
    eu868_bands: [i64; 3],
    per_chnl: [i64; MAX_DNCHNLS + 1],
    chnl_rate: i64,
}

impl DutyCycleState {
    /// `chnl_rate` is the per-channel duty-cycle divisor (e.g. `100` for a
    /// 1% regional limit); `0` leaves it permanently free.
    pub fn new(chnl_rate: i64) -> Self {
        DutyCycleState {
            eu868_bands: [USTIME_MIN; 3],
            per_chnl: [USTIME_MIN; MAX_DNCHNLS + 1],
            chnl_rate,
        }
    }

    pub fn disable_eu868_bands(&mut self) {
        self.eu868_bands = [USTIME_MIN; 3];
    }

    /// Un-pins every EU868 sub-band so [`Self::record_tx`] starts advancing
    /// them from this call's "now".
    pub fn enable_eu868_bands(&mut self) {
        self.eu868_bands = [0; 3];
    }

    pub fn block_channel_forever(&mut self, chnl: usize) {
        self.per_chnl[chnl.min(MAX_DNCHNLS)] = USTIME_MAX;
    }

    /// Un-pins every per-channel slot so [`Self::record_tx`] starts
    /// advancing them.
    pub fn enable_per_channel(&mut self) {
        self.per_chnl = [0; MAX_DNCHNLS + 1];
    }

    /// Records that a transmission of `airtime` µs went out at `txtime` on
    /// `freq`/`chnl`, advancing both the EU868 band expiry (if this state's
    /// region tracks bands) and the per-channel expiry, unless pinned to a
    /// sentinel.
    pub fn record_tx(&mut self, freq: u32, chnl: usize, txtime: i64, airtime: i64) {
        let band = freq2band(freq) as usize;
        let t = self.eu868_bands[band];
        if t != USTIME_MIN && t != USTIME_MAX {
            self.eu868_bands[band] = txtime + airtime * EU868_BAND_RATE[band];
        }
        let chnl = chnl.min(MAX_DNCHNLS);
        let t = self.per_chnl[chnl];
        if t != USTIME_MIN && t != USTIME_MAX && self.chnl_rate != 0 {
            self.per_chnl[chnl] = txtime + airtime * self.chnl_rate;
        }
    }

    /// EU868 band-based check: the whole sub-band must be clear, no CCA
    /// needed (`s2e_canTxEU868`).
    pub fn can_tx_eu868(&self, freq: u32, txtime: i64) -> bool {
        txtime >= self.eu868_bands[freq2band(freq) as usize]
    }

    /// Per-channel check used by AS923/KR920: channel must be clear, and
    /// the caller should additionally run CCA (`s2e_canTxPerChnlDC`
    /// returns "can send if channel clear" rather than an unconditional
    /// pass).
    pub fn can_tx_per_channel(&self, chnl: usize) -> bool {
        // txtime comparison deferred to caller via `channel_free_at`
        self.per_chnl[chnl.min(MAX_DNCHNLS)] == USTIME_MIN
    }

    pub fn channel_free_at(&self, chnl: usize) -> i64 {
        self.per_chnl[chnl.min(MAX_DNCHNLS)]
    }
}

/// One [`DutyCycleState`] per antenna/txunit.
pub struct DutyCycleTable {
    units: Vec<DutyCycleState>,
}

impl DutyCycleTable {
    pub fn new(chnl_rate: i64) -> Self {
        DutyCycleTable {
            units: (0..MAX_TXUNITS).map(|_| DutyCycleState::new(chnl_rate)).collect(),
        }
    }

    pub fn unit(&self, txunit: u8) -> &DutyCycleState {
        &self.units[txunit as usize]
    }

    pub fn unit_mut(&mut self, txunit: u8) -> &mut DutyCycleState {
        &mut self.units[txunit as usize]
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut DutyCycleState> {
        self.units.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freq_classification_matches_eu868_table() {
        assert_eq!(freq2band(869_525_000), Eu868Band::Deci);
        assert_eq!(freq2band(868_100_000), Eu868Band::Centi);
        assert_eq!(freq2band(865_000_000), Eu868Band::Milli);
    }

    #[test]
    fn band_blocks_until_airtime_times_rate_elapses() {
        let mut dc = DutyCycleState::new(0);
        dc.eu868_bands = [0, 0, 0]; // enable tracking (not pinned to sentinels)
        dc.record_tx(869_525_000, 0, 1_000_000, 50_000);
        assert!(!dc.can_tx_eu868(869_525_000, 1_000_000 + 50_000));
        assert!(dc.can_tx_eu868(869_525_000, 1_000_000 + 50_000 * 10 + 1));
    }

    #[test]
    fn disabled_band_never_blocks() {
        let mut dc = DutyCycleState::new(0);
        dc.disable_eu868_bands();
        dc.record_tx(869_525_000, 0, 0, 1_000_000);
        assert!(dc.can_tx_eu868(869_525_000, 0));
    }

    #[test]
    fn blocked_channel_never_clears() {
        let mut dc = DutyCycleState::new(100);
        dc.block_channel_forever(3);
        assert!(!dc.can_tx_per_channel(3));
    }
}
