//! The `TxJob` record and its arena handle types.

use crate::constants::MAX_TXUNITS;
use bitflags::bitflags;

/// Index into the TX job pool. `NIL` means "not queued anywhere"; `END`
/// terminates a per-antenna list. Mirrors `xq.h`'s `txidx_t`/`TXIDX_NIL`/
/// `TXIDX_END` (there: `u1_t`, capped at 255 jobs; here widened to `u16`
/// since the pool capacity is a compile-time constant, not a protocol
/// limit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxIdx {
    Slot(u16),
    End,
    Nil,
}

impl TxIdx {
    pub fn slot(self) -> Option<u16> {
        match self {
            TxIdx::Slot(i) => Some(i),
            _ => None,
        }
    }
}

/// Offset into the shared TX payload arena, or "no data reserved".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOff {
    At(u32),
    Nil,
}

bitflags! {
    /// Per-job scheduler flags (`s2e.h` `TXFLAG_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxFlags: u8 {
        /// The radio has been asked to emit this job.
        const TXING     = 0x01;
        /// Radio status confirmed EMITTING and a `dntxed` event was reported.
        const TXCHECKED = 0x02;
        /// Class A downlink (RX1/RX2 window).
        const CLSA      = 0x04;
        /// Class B ping-slot downlink.
        const PING      = 0x08;
        /// Class C continuous-receive downlink.
        const CLSC      = 0x10;
        /// Beacon frame.
        const BCN       = 0x20;
    }
}

/// A pending or in-flight downlink. Invariants (enforced by `TxPool`, see
/// module docs): a job is on at most one list; `TXING` implies the radio has
/// been asked to emit; `TXCHECKED` implies radio status was confirmed
/// EMITTING and a `dntxed` event was reported.
#[derive(Debug, Clone)]
pub struct TxJob {
    // Identity
    pub deveui: u64,
    pub diid: i64,

    // Timing
    pub txtime: i64,
    pub xtime: i64,
    pub gpstime: Option<i64>,
    pub rxdelay: u8,
    pub airtime: i64,

    // Channel
    pub freq: u32,
    pub dr: u8,
    pub rx2freq: u32,
    pub rx2dr: u8,
    pub dnchnl: u8,
    pub dnchnl2: u8,

    // Radio
    pub txpow: i16,
    pub len: u8,
    pub rctx: i64,

    // Scheduler state
    pub txunit: u8,
    pub alt_ants: u8,
    pub retries: u8,
    pub prio: i16,
    pub flags: TxFlags,

    // Linkage
    pub next: TxIdx,
    pub off: TxOff,
}

impl TxJob {
    pub fn new(deveui: u64, diid: i64, txtime: i64) -> Self {
        TxJob {
            deveui,
            diid,
            txtime,
            xtime: 0,
            gpstime: None,
            rxdelay: 1,
            airtime: 0,
            freq: 0,
            dr: 0,
            rx2freq: 0,
            rx2dr: 0,
            dnchnl: 0,
            dnchnl2: 0,
            txpow: 0,
            len: 0,
            rctx: 0,
            txunit: 0,
            alt_ants: 0,
            retries: 0,
            prio: 0,
            flags: TxFlags::empty(),
            next: TxIdx::Nil,
            off: TxOff::Nil,
        }
    }

    pub fn class_a(&self) -> bool {
        self.flags.contains(TxFlags::CLSA)
    }
    pub fn class_c(&self) -> bool {
        self.flags.contains(TxFlags::CLSC)
    }
    pub fn is_beacon(&self) -> bool {
        self.flags.contains(TxFlags::BCN)
    }

    /// Half-open air-occupancy window `[txtime, txtime+airtime+TX_MIN_GAP)`.
    pub fn occupancy_end(&self, tx_min_gap: i64) -> i64 {
        self.txtime + self.airtime + tx_min_gap
    }

    /// Other antennas (bitmask, 1 bit per txunit) eligible to carry this job.
    pub fn alt_antennas(&self) -> impl Iterator<Item = u8> + '_ {
        (0..MAX_TXUNITS as u8).filter(move |&u| u != self.txunit && (self.alt_ants & (1 << u)) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_window_includes_min_gap() {
        let mut j = TxJob::new(1, 1, 1_000_000);
        j.airtime = 50_000;
        assert_eq!(j.occupancy_end(10_000), 1_060_000);
    }

    #[test]
    fn alt_antennas_excludes_self() {
        let mut j = TxJob::new(1, 1, 0);
        j.txunit = 1;
        j.alt_ants = 0b1111;
        let alts: Vec<u8> = j.alt_antennas().collect();
        assert_eq!(alts, vec![0, 2, 3]);
    }
}
