//! Class B beacon framing and the beacon-state machine. Ported from
//! `lora.c`'s `crc16_no_table`/`s2e_make_beacon` and `s2e.c`'s
//! `s2e_bcntimeout`.

use crate::constants::{BEACON_INTVL_S, BEACON_PREP_LEAD, BEACON_RETRY_INTV};
use bitflags::bitflags;

/// CRC16-CCITT (poly `0x1021`, no reflection, zero init) — the generic-gravity
/// beacon checksum, not the ramps/table-driven variant used elsewhere.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut remainder: u32 = 0;
    for &byte in data {
        remainder ^= (byte as u32) << 8;
        for _ in 0..8 {
            remainder = if remainder & 0x8000 != 0 {
                (remainder << 1) ^ 0x1021
            } else {
                remainder << 1
            };
        }
    }
    (remainder & 0xFFFF) as u16
}

/// Byte offsets describing where the beacon's time field, gateway-specific
/// block, and total length land, as handed down in `router_config`. The
/// original keeps these configurable per region rather than hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconLayout {
    pub time_off: u8,
    pub infodesc_off: u8,
    pub bcn_len: u8,
}

impl BeaconLayout {
    /// EU868's standard 17-byte beacon: 2 bytes RFU, 4-byte time, 2-byte
    /// CRC, then the 7-byte gateway-specific block (infoDesc+lon+lat), 2
    /// bytes RFU, 2-byte CRC.
    pub const EU868: BeaconLayout = BeaconLayout {
        time_off: 2,
        infodesc_off: 8,
        bcn_len: 17,
    };
}

/// Packs `epoch_secs`/`infodesc`/position into a beacon PDU per `layout`,
/// including both CRC16 fields. Mirrors `s2e_make_beacon`'s byte order
/// exactly: the gateway-specific block is `infoDesc, lon(3B), lat(3B)` —
/// longitude precedes latitude in the wire layout.
pub fn make_beacon(layout: BeaconLayout, epoch_secs: i64, infodesc: u8, lat: f64, lon: f64) -> Vec<u8> {
    let time_off = layout.time_off as usize;
    let infodesc_off = layout.infodesc_off as usize;
    let bcn_len = layout.bcn_len as usize;
    let mut pdu = vec![0u8; bcn_len];

    for i in 0..4 {
        pdu[time_off + i] = (epoch_secs >> (8 * i)) as u8;
    }

    let ulon = ((lon / 180.0) * (1u64 << 31) as f64) as i64 as u32;
    let ulat = ((lat / 90.0) * (1u64 << 31) as f64) as i64 as u32;
    for i in 0..3 {
        pdu[infodesc_off + 1 + i] = (ulon >> (8 * i)) as u8;
        pdu[infodesc_off + 4 + i] = (ulat >> (8 * i)) as u8;
    }
    pdu[infodesc_off] = infodesc;

    let crc1 = crc16_ccitt(&pdu[0..infodesc_off - 2]);
    let crc2 = crc16_ccitt(&pdu[infodesc_off..bcn_len - 2]);
    pdu[infodesc_off - 2] = crc1 as u8;
    pdu[infodesc_off - 1] = (crc1 >> 8) as u8;
    pdu[bcn_len - 2] = crc2 as u8;
    pdu[bcn_len - 1] = (crc2 >> 8) as u8;

    pdu
}

bitflags! {
    /// Tracks why beaconing is currently suspended, if it is. `empty()` ==
    /// `BCNING_OK`: time and position both known, beacon task is live.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BcnState: u8 {
        const NOTIME = 0x01;
        const NOPOS  = 0x02;
    }
}

/// The station's beacon configuration and latched failure state. `ctrl`
/// packs the beacon data rate in the low nibble and the active frequency
/// count in the high nibble, matching the wire layout `router_config` hands
/// down (`s2bcn_t.ctrl`).
#[derive(Debug, Clone)]
pub struct BeaconConfig {
    pub ctrl: u8,
    pub layout: BeaconLayout,
    pub freqs: Vec<u32>,
    state: BcnState,
}

impl BeaconConfig {
    pub fn new(dr: u8, freqs: Vec<u32>, layout: BeaconLayout) -> Self {
        assert!(!freqs.is_empty() && freqs.len() <= 8);
        BeaconConfig {
            ctrl: (dr & 0x0F) | ((freqs.len() as u8) << 4),
            layout,
            freqs,
            state: BcnState::empty(),
        }
    }

    pub fn dr(&self) -> u8 {
        self.ctrl & 0x0F
    }

    fn freq_count(&self) -> u8 {
        self.ctrl >> 4
    }

    /// Frequency to use for the beacon whose epoch (beacon-interval index)
    /// is `epoch`, rotating through the configured set.
    pub fn freq_for_epoch(&self, epoch: i64) -> u32 {
        let n = self.freq_count() as i64;
        self.freqs[(epoch.rem_euclid(n)) as usize]
    }

    pub fn state(&self) -> BcnState {
        self.state
    }

    /// Folds in a fresh time/position availability reading; returns `true`
    /// if the state changed (caller should log the transition, naming
    /// which of `NOTIME`/`NOPOS` flipped).
    pub fn update_state(&mut self, have_gpstime: bool, have_latlon: bool) -> bool {
        let mut next = BcnState::empty();
        if !have_gpstime {
            next |= BcnState::NOTIME;
        }
        if !have_latlon {
            next |= BcnState::NOPOS;
        }
        let changed = next != self.state;
        self.state = next;
        changed
    }

    pub fn is_ok(&self) -> bool {
        self.state.is_empty()
    }
}

/// Computed beacon for one upcoming slot, ready to become a `TxJob`.
pub struct NextBeacon {
    pub gpstime: i64,
    pub freq: u32,
    pub dr: u8,
    pub pdu: Vec<u8>,
}

/// Plans the next beacon TX given the current GPS time and position,
/// following `s2e_bcntimeout`'s "next multiple of 128s that's at least 1s
/// ahead" rule. Returns `None` (with the beacon task's retry delay) if
/// state is not OK, and the delay to the *following* wakeup alongside a
/// successful plan.
pub fn plan_next_beacon(cfg: &mut BeaconConfig, gpstime: Option<i64>, latlon: Option<(f64, f64)>) -> (Option<NextBeacon>, i64) {
    let changed = cfg.update_state(gpstime.is_some(), latlon.is_some());
    if changed {
        log::info!(
            "Beaconing {} - {}GPS data{}",
            if cfg.is_ok() { "resumed" } else { "suspended" },
            if cfg.is_ok() { "recovered " } else { "missing " },
            if cfg.is_ok() {
                ""
            } else if cfg.state().contains(BcnState::NOTIME) && cfg.state().contains(BcnState::NOPOS) {
                ": time, position"
            } else if cfg.state().contains(BcnState::NOTIME) {
                ": time"
            } else {
                ": position"
            }
        );
    }
    if !cfg.is_ok() {
        return (None, BEACON_RETRY_INTV);
    }
    let gpstime = gpstime.expect("state OK implies gpstime present");
    let (lat, lon) = latlon.expect("state OK implies position present");

    let ahead = BEACON_INTVL_S * 1_000_000 - gpstime.rem_euclid(BEACON_INTVL_S * 1_000_000);
    let gpstxtime = gpstime + ahead;
    let epoch = gpstxtime / (BEACON_INTVL_S * 1_000_000);

    let pdu = make_beacon(cfg.layout, epoch * BEACON_INTVL_S, 0, lat, lon);
    let next = NextBeacon {
        gpstime: gpstxtime,
        freq: cfg.freq_for_epoch(epoch),
        dr: cfg.dr(),
        pdu,
    };
    let next_wakeup = ahead + BEACON_INTVL_S * 1_000_000 - BEACON_PREP_LEAD;
    (Some(next), next_wakeup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_of_empty_input_is_zero() {
        assert_eq!(crc16_ccitt(&[]), 0);
    }

    #[test]
    fn beacon_round_trips_crc() {
        let layout = BeaconLayout::EU868;
        let pdu = make_beacon(layout, 128 * 1000, 0, 48.2, 16.37);
        assert_eq!(pdu.len(), layout.bcn_len as usize);
        let infodesc_off = layout.infodesc_off as usize;
        let bcn_len = layout.bcn_len as usize;
        let crc1 = crc16_ccitt(&pdu[0..infodesc_off - 2]);
        let crc2 = crc16_ccitt(&pdu[infodesc_off..bcn_len - 2]);
        assert_eq!(pdu[infodesc_off - 2] as u16 | ((pdu[infodesc_off - 1] as u16) << 8), crc1);
        assert_eq!(pdu[bcn_len - 2] as u16 | ((pdu[bcn_len - 1] as u16) << 8), crc2);
    }

    #[test]
    fn beacon_state_flips_on_missing_position() {
        let mut cfg = BeaconConfig::new(3, vec![869_525_000], BeaconLayout::EU868);
        assert!(cfg.update_state(true, true) == false || cfg.is_ok());
        assert!(cfg.is_ok());
        assert!(cfg.update_state(true, false));
        assert!(!cfg.is_ok());
        assert!(cfg.state().contains(BcnState::NOPOS));
    }

    #[test]
    fn freq_rotates_by_epoch() {
        let cfg = BeaconConfig::new(3, vec![100, 200, 300], BeaconLayout::EU868);
        assert_eq!(cfg.freq_for_epoch(0), 100);
        assert_eq!(cfg.freq_for_epoch(1), 200);
        assert_eq!(cfg.freq_for_epoch(3), 100);
    }

    #[test]
    fn plan_next_beacon_reports_retry_when_state_bad() {
        let mut cfg = BeaconConfig::new(3, vec![869_525_000], BeaconLayout::EU868);
        let (plan, delay) = plan_next_beacon(&mut cfg, None, None);
        assert!(plan.is_none());
        assert_eq!(delay, BEACON_RETRY_INTV);
    }
}
