//! Data-rate table: maps a region's `DR0..DR15` index to an [`Rps`], and
//! back. Ported from `s2e.h`'s `dr_t`/`DR_CNT` and the per-region DR tables
//! in `regions.c`.

use crate::constants::DR_CNT;
use crate::s2e::rps::{Rps, RPS_ILLEGAL};

/// One region's DR0..DR15 mapping. Unused high indices default to
/// [`Rps::ILLEGAL`], matching the original's zero-initialised table (an
/// illegal `Rps` byte happens to be `0xFF`, never a valid `0`-initialised
/// value, so there's no silent aliasing).
#[derive(Debug, Clone)]
pub struct DrTable {
    rps: [Rps; DR_CNT],
}

impl DrTable {
    pub fn new() -> Self {
        DrTable {
            rps: [Rps::ILLEGAL; DR_CNT],
        }
    }

    pub fn set(&mut self, dr: u8, rps: Rps) {
        if (dr as usize) < DR_CNT {
            self.rps[dr as usize] = rps;
        }
    }

    pub fn get(&self, dr: u8) -> Rps {
        self.rps.get(dr as usize).copied().unwrap_or(Rps::ILLEGAL)
    }

    pub fn is_legal(&self, dr: u8) -> bool {
        self.get(dr).0 != RPS_ILLEGAL
    }

    /// EU868's standard DR0..DR7 table: DR0-5 are SF12..SF7 @125kHz, DR6 is
    /// SF7@250kHz, DR7 is FSK.
    pub fn eu868() -> Self {
        use crate::s2e::rps::*;
        let mut t = DrTable::new();
        t.set(0, Rps::make(SF12, BW125));
        t.set(1, Rps::make(SF11, BW125));
        t.set(2, Rps::make(SF10, BW125));
        t.set(3, Rps::make(SF9, BW125));
        t.set(4, Rps::make(SF8, BW125));
        t.set(5, Rps::make(SF7, BW125));
        t.set(6, Rps::make(SF7, BW250));
        t.set(7, Rps::make(FSK, 0));
        t
    }

    /// US915 upstream DR0..DR4 (125kHz) + DR8..DR13 downstream (500kHz).
    pub fn us915() -> Self {
        use crate::s2e::rps::*;
        let mut t = DrTable::new();
        t.set(0, Rps::make(SF10, BW125));
        t.set(1, Rps::make(SF9, BW125));
        t.set(2, Rps::make(SF8, BW125));
        t.set(3, Rps::make(SF7, BW125));
        t.set(4, Rps::make(SF8, BW500));
        t.set(8, Rps::make(SF12, BW500));
        t.set(9, Rps::make(SF11, BW500));
        t.set(10, Rps::make(SF10, BW500));
        t.set(11, Rps::make(SF9, BW500));
        t.set(12, Rps::make(SF8, BW500));
        t.set(13, Rps::make(SF7, BW500));
        t
    }
}

impl Default for DrTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_slots_are_illegal() {
        let t = DrTable::new();
        assert!(!t.is_legal(0));
        assert!(t.get(0).is_illegal());
    }

    #[test]
    fn eu868_dr0_is_sf12bw125() {
        let t = DrTable::eu868();
        assert!(t.is_legal(0));
        assert_eq!(t.get(0).spreading_factor(), Some(12));
        assert_eq!(t.get(0).bandwidth_hz(), Some(125_000));
    }
}
