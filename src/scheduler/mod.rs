//! The TX scheduler: admits downlinks into per-antenna ordered queues,
//! resolving RX1/RX2 (and class C backoff) fallback, collision avoidance,
//! and regulatory duty-cycle/CCA adjudication. Ported from `s2e.c`'s
//! `s2e_addTxjob`/`findCollision`/`s2e_nextTxAction`.

pub mod airtime;
pub mod dutycycle;

use crate::constants::{
    CLASS_C_BACKOFF_BY, CLASS_C_BACKOFF_MAX, PRIO_PENALTY_ALTANTENNA, PRIO_PENALTY_ALTTXTIME, PRIO_PENALTY_CCA,
    RX2_FALLBACK_SHIFT, TX_AIM_GAP, TX_MAX_AHEAD, TX_MIN_GAP,
};
use crate::error::{Result, StationError};
use crate::region::dr::DrTable;
use crate::region::{CanTx, DcMode, RegionPolicy};
use crate::txrx::{TxFlags, TxIdx, TxJob, TxPool};
use dutycycle::DutyCycleTable;

/// Owns every antenna's pending-downlink queue and duty-cycle bookkeeping.
/// One `Scheduler` exists per station; the region policy is supplied by the
/// caller (it changes only on `router_config`, and is shared read-only with
/// everything else that needs regulatory limits). The DR->Rps table is set
/// once from the active `router_config` via [`Self::set_dr_table`]; until
/// then it defaults to EU868's.
pub struct Scheduler {
    pool: TxPool,
    dc: DutyCycleTable,
    dr_table: DrTable,
}

impl Scheduler {
    pub fn new(chnl_rate: i64) -> Self {
        Scheduler {
            pool: TxPool::new(),
            dc: DutyCycleTable::new(chnl_rate),
            dr_table: DrTable::eu868(),
        }
    }

    pub fn set_dr_table(&mut self, table: DrTable) {
        self.dr_table = table;
    }

    /// Rebuilds the duty-cycle table for a freshly-applied `router_config`:
    /// adopts `policy`'s per-channel rate, then enables whichever tracking
    /// mode the region uses so [`DutyCycleState::record_tx`] actually
    /// advances it, unless the LNS asked for duty cycle to be disabled
    /// (`nodc`).
    ///
    /// [`DutyCycleState::record_tx`]: dutycycle::DutyCycleState::record_tx
    pub fn configure_region(&mut self, policy: &dyn RegionPolicy, nodc: bool) {
        self.dc = DutyCycleTable::new(policy.chnl_rate());
        if nodc {
            return;
        }
        let mode = policy.dc_mode();
        for unit in self.dc.units_mut() {
            match mode {
                DcMode::Eu868SubBand => unit.enable_eu868_bands(),
                DcMode::PerChannelCca => unit.enable_per_channel(),
                DcMode::None => {}
            }
        }
    }

    /// Resolves a data rate index to its spreading factor/bandwidth via the
    /// active region's DR table, for callers building the RAL `TxReq` that
    /// don't otherwise touch the table (e.g. the dispatch path).
    pub fn rps_for_dr(&self, dr: u8) -> crate::s2e::rps::Rps {
        self.dr_table.get(dr)
    }

    pub fn pool(&self) -> &TxPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut TxPool {
        &mut self.pool
    }

    /// Admits `job` for transmission. For a class A job with an RX2
    /// alternative configured (non-zero `rx2freq`), tries the primary
    /// `txtime` first, then `txtime + RX2_FALLBACK_SHIFT` at `rx2freq`/
    /// `rx2dr`. For a class C job, retries scheduling at `CLASS_C_BACKOFF_BY`
    /// intervals up to `CLASS_C_BACKOFF_MAX` times before giving up.
    /// Whichever candidate is chosen, `job.freq`/`job.dr`/`job.txtime`/
    /// `job.prio` are updated to reflect it.
    pub fn add_txjob(&mut self, mut job: TxJob, policy: &dyn RegionPolicy, now: i64) -> Result<TxIdx> {
        if job.txtime - now > TX_MAX_AHEAD {
            return Err(StationError::TxTooFarAhead { txtime: job.txtime, now });
        }

        let candidates = self.candidate_windows(&job);
        for (txtime, freq, dr, chnl, penalty) in candidates {
            if let Some(airtime) = self.try_slot(&mut job, policy, txtime, freq, dr, chnl, penalty, now) {
                let _ = airtime;
                let idx = self.pool.reserve(job)?;
                self.pool.insert_ordered(idx_antenna(&self.pool, idx), idx);
                return Ok(idx);
            }
        }

        if job.class_c() {
            return self.retry_class_c(job, policy, now);
        }

        Err(StationError::TxNoSlot {
            deveui: job.deveui,
            diid: job.diid,
        })
    }

    fn retry_class_c(&mut self, mut job: TxJob, policy: &dyn RegionPolicy, now: i64) -> Result<TxIdx> {
        for attempt in 1..=CLASS_C_BACKOFF_MAX {
            job.txtime = now + attempt as i64 * CLASS_C_BACKOFF_BY;
            job.retries = attempt as u8;
            if let Some(_airtime) = self.try_slot(&mut job, policy, job.txtime, job.freq, job.dr, job.dnchnl as usize, 0, now) {
                let idx = self.pool.reserve(job)?;
                self.pool.insert_ordered(idx_antenna(&self.pool, idx), idx);
                return Ok(idx);
            }
        }
        Err(StationError::TxNoSlot {
            deveui: job.deveui,
            diid: job.diid,
        })
    }

    /// RX1 (primary) then RX2 candidate windows, in priority order. Class C
    /// jobs have no RX1/RX2 distinction and are tried once at their given
    /// `txtime` before falling back to [`Self::retry_class_c`].
    fn candidate_windows(&self, job: &TxJob) -> Vec<(i64, u32, u8, usize, i16)> {
        let mut out = vec![(job.txtime, job.freq, job.dr, job.dnchnl as usize, 0i16)];
        if job.class_a() && job.rx2freq != 0 {
            out.push((
                job.txtime + RX2_FALLBACK_SHIFT,
                job.rx2freq,
                job.rx2dr,
                job.dnchnl2 as usize,
                PRIO_PENALTY_ALTTXTIME,
            ));
        }
        out
    }

    /// Tries to fit `job` (updated in place with the candidate's
    /// freq/dr/txtime/prio/airtime on success) at `txtime`/`freq`/`chnl` on
    /// `job.txunit`, falling back to any antenna named in `job.alt_ants`.
    /// Rejects the candidate outright if it's already too close to `now`
    /// (within [`TX_AIM_GAP`]) to reliably hand to the radio. Returns the
    /// computed airtime on success.
    fn try_slot(
        &self,
        job: &mut TxJob,
        policy: &dyn RegionPolicy,
        txtime: i64,
        freq: u32,
        dr: u8,
        chnl: usize,
        base_penalty: i16,
        now: i64,
    ) -> Option<i64> {
        if txtime < now + TX_AIM_GAP {
            return None;
        }

        let rps = self.dr_table.get(dr);
        let airtime = airtime::calc_dn_airtime(rps, job.len, true, 0);

        let mut antennas = vec![(job.txunit, 0i16)];
        for alt in job.alt_antennas() {
            antennas.push((alt, PRIO_PENALTY_ALTANTENNA));
        }

        for (ant, ant_penalty) in antennas {
            let dc_state = self.dc.unit(ant);
            let can = policy.can_tx(dc_state, freq, chnl, txtime);
            if can == CanTx::No {
                continue;
            }
            if self.collides(ant, txtime, airtime) {
                continue;
            }
            let cca_penalty = if can == CanTx::NeedsCca { PRIO_PENALTY_CCA } else { 0 };
            job.txunit = ant;
            job.freq = freq;
            job.dr = dr;
            job.txtime = txtime;
            job.airtime = airtime;
            job.prio = base_penalty + ant_penalty + cca_penalty;
            return Some(airtime);
        }
        None
    }

    /// Whether a job of `airtime` µs at `txtime` would overlap any job
    /// already queued on `ant`, accounting for [`TX_MIN_GAP`] on both sides.
    fn collides(&self, ant: u8, txtime: i64, airtime: i64) -> bool {
        let end = txtime + airtime + TX_MIN_GAP;
        self.pool.iter_antenna(ant).any(|idx| {
            let other = self.pool.get(idx).unwrap();
            let other_end = other.occupancy_end(TX_MIN_GAP);
            txtime < other_end && other.txtime < end
        })
    }

    /// Records that `idx`'s job actually transmitted, advancing the
    /// antenna's duty-cycle bookkeeping, then unlinks and frees it.
    pub fn confirm_tx(&mut self, ant: u8, idx: TxIdx) {
        if let Some(job) = self.pool.get(idx) {
            let (freq, chnl, txtime, airtime) = (job.freq, job.dnchnl as usize, job.txtime, job.airtime);
            self.dc.unit_mut(ant).record_tx(freq, chnl, txtime, airtime);
        }
        self.pool.unlink(ant, idx);
        self.pool.free(idx);
    }

    /// Pops the head of `ant`'s queue if it is due by `now` (its `txtime`
    /// has arrived), marking it [`TxFlags::TXING`]. Returns `None` if the
    /// queue is empty or its head isn't due yet.
    pub fn next_tx_action(&mut self, ant: u8, now: i64) -> Option<TxIdx> {
        let head = self.pool.head(ant);
        let due = matches!(head, TxIdx::Slot(_))
            && self
                .pool
                .get(head)
                .map(|j| j.txtime <= now && !j.flags.contains(TxFlags::TXING))
                .unwrap_or(false);
        if due {
            if let Some(job) = self.pool.get_mut(head) {
                job.flags |= TxFlags::TXING;
            }
        }
        due.then_some(head)
    }
}

fn idx_antenna(pool: &TxPool, idx: TxIdx) -> u8 {
    pool.get(idx).map(|j| j.txunit).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    fn class_a_job(txtime: i64) -> TxJob {
        let mut j = TxJob::new(1, 1, txtime);
        j.flags |= TxFlags::CLSA;
        j.dr = 5;
        j.len = 10;
        j
    }

    #[test]
    fn admits_non_colliding_job() {
        let mut sched = Scheduler::new(0);
        let policy = Region::Us915.policy();
        let idx = sched.add_txjob(class_a_job(1_000_000), policy.as_ref(), 0).unwrap();
        assert!(sched.pool().get(idx).is_some());
    }

    #[test]
    fn colliding_job_falls_back_to_rx2() {
        let mut sched = Scheduler::new(0);
        let policy = Region::Us915.policy();
        let first = class_a_job(1_000_000);
        sched.add_txjob(first, policy.as_ref(), 0).unwrap();

        let mut second = class_a_job(1_000_000);
        second.rx2freq = 869_525_000;
        second.rx2dr = 0;
        let idx = sched.add_txjob(second, policy.as_ref(), 0).unwrap();
        let job = sched.pool().get(idx).unwrap();
        assert_eq!(job.txtime, 1_000_000 + RX2_FALLBACK_SHIFT);
    }

    #[test]
    fn too_far_ahead_is_rejected() {
        let mut sched = Scheduler::new(0);
        let policy = Region::Us915.policy();
        let job = class_a_job(TX_MAX_AHEAD + 1);
        assert!(sched.add_txjob(job, policy.as_ref(), 0).is_err());
    }

    #[test]
    fn job_too_close_to_now_falls_back_rx1_to_rx2() {
        let mut sched = Scheduler::new(0);
        let policy = Region::Us915.policy();
        let now = 1_000_000;
        let mut job = class_a_job(now + TX_AIM_GAP - 1);
        job.rx2freq = 869_525_000;
        job.rx2dr = 0;
        let idx = sched.add_txjob(job, policy.as_ref(), now).unwrap();
        let got = sched.pool().get(idx).unwrap();
        assert_eq!(got.txtime, now + TX_AIM_GAP - 1 + RX2_FALLBACK_SHIFT);
    }

    #[test]
    fn job_too_close_to_now_with_no_rx2_is_dropped() {
        let mut sched = Scheduler::new(0);
        let policy = Region::Us915.policy();
        let now = 1_000_000;
        let job = class_a_job(now + TX_AIM_GAP - 1);
        assert!(sched.add_txjob(job, policy.as_ref(), now).is_err());
    }

    #[test]
    fn confirm_tx_frees_the_slot() {
        let mut sched = Scheduler::new(0);
        let policy = Region::Us915.policy();
        let idx = sched.add_txjob(class_a_job(1_000_000), policy.as_ref(), 0).unwrap();
        sched.confirm_tx(0, idx);
        assert_eq!(sched.pool().used(), 0);
    }
}
