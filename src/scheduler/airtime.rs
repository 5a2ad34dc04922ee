//! LoRa/FSK on-air time calculation. Ported from `s2e.c`'s `_calcAirTime`
//! (itself adapted there from LMIC), used for both downlink scheduling
//! (`calc_dn_airtime`) and uplink frame accounting (`calc_up_airtime`).

use crate::s2e::rps::{Rps, FSK};

/// Microseconds to transmit `plen` bytes at `rps`, with an explicit
/// preamble length (symbols; `0` means "use the 8-symbol default") and
/// whether the frame carries a CRC (uplinks always do; downlinks are
/// optional per `addcrc`).
pub fn calc_air_time(rps: Rps, plen: u8, has_crc: bool, preamble: u16) -> i64 {
    if rps.is_illegal() {
        return 0;
    }
    let preamble = if preamble == 0 { 8 } else { preamble } as i64;
    let bw = rps.bw();
    if rps.sf() == FSK {
        // (payload + preamble + syncword + len + crc) bytes, 8 bits/byte, at 50kbit/s.
        let bytes = plen as i64 + 5 + 3 + 1 + 2;
        return bytes * 8 * 1_000_000 / 50_000;
    }
    let sf = 12 - rps.sf() as i64; // enum SF12..SF7 (0..5) -> numeric 12..7
    let sfx = 4 * sf;
    let q = sfx - if sf >= 11 && bw == 0 { 8 } else { 0 };
    let cr = 0i64; // station always transmits at CR 4/5
    let plen = plen as i64;
    let mut tmp = 8 * plen - sfx + 28 + if has_crc { 16 } else { 0 };
    tmp = if tmp > 0 {
        let tmp = (tmp + q - 1) / q;
        tmp * (cr + 5) + 8
    } else {
        8
    };
    let tmp = (tmp << 2) + 17 + 4 * preamble;

    let mut sfx2 = sf - 5 - bw as i64;
    let mut div: i64 = 15625;
    if sfx2 > 4 {
        div >>= sfx2 - 4;
        sfx2 = 4;
    }
    ((tmp << sfx2) * 1_000_000 + div / 2) / div
}

/// Downlink air time: `addcrc` selects whether a CRC is appended.
pub fn calc_dn_airtime(rps: Rps, plen: u8, addcrc: bool, preamble: u16) -> i64 {
    calc_air_time(rps, plen, addcrc, preamble)
}

/// Uplink air time: uplinks always carry a CRC and use the default preamble.
pub fn calc_up_airtime(rps: Rps, plen: u8) -> i64 {
    calc_air_time(rps, plen, true, 8)
}
