//! Fixed-capacity TX job pool: a free list plus per-antenna ordered
//! singly-linked lists threaded through `TxJob::next`, and a single shared
//! byte arena for pending TX payloads. Ported from `xq.h`'s `txq_t`.

use super::txjob::{TxIdx, TxJob, TxOff};
use crate::constants::{MAX_TXDATA, MAX_TXJOBS, MAX_TXUNITS};
use crate::error::{Result, StationError};

pub struct TxPool {
    jobs: Vec<Option<TxJob>>,
    free_head: TxIdx,
    /// Per-antenna head of the ascending-`txtime` ordered list.
    heads: [TxIdx; MAX_TXUNITS],
    data: Vec<u8>,
}

impl TxPool {
    pub fn new() -> Self {
        let mut jobs = Vec::with_capacity(MAX_TXJOBS);
        for _ in 0..MAX_TXJOBS {
            jobs.push(None);
        }
        TxPool {
            jobs,
            free_head: TxIdx::End,
            heads: [TxIdx::End; MAX_TXUNITS],
            data: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        MAX_TXJOBS
    }

    pub fn head(&self, antenna: u8) -> TxIdx {
        self.heads[antenna as usize]
    }

    pub fn get(&self, idx: TxIdx) -> Option<&TxJob> {
        idx.slot().and_then(|i| self.jobs[i as usize].as_ref())
    }

    pub fn get_mut(&mut self, idx: TxIdx) -> Option<&mut TxJob> {
        idx.slot().and_then(|i| self.jobs[i as usize].as_mut())
    }

    /// Reserve a free slot and take ownership of `job`, returning its handle.
    /// The job is not yet linked into any antenna list.
    pub fn reserve(&mut self, job: TxJob) -> Result<TxIdx> {
        let idx = self.first_free().ok_or(StationError::TxPoolExhausted {
            capacity: MAX_TXJOBS,
        })?;
        self.jobs[idx as usize] = Some(job);
        Ok(TxIdx::Slot(idx))
    }

    fn first_free(&self) -> Option<u16> {
        (0..MAX_TXJOBS as u16).find(|&i| self.jobs[i as usize].is_none())
    }

    /// Reserve `len` bytes in the shared arena for `idx`'s payload, copying
    /// `payload` in. Returns an error if the arena has no room.
    pub fn reserve_data(&mut self, idx: TxIdx, payload: &[u8]) -> Result<()> {
        let need = payload.len();
        if self.data.len() + need > MAX_TXDATA {
            return Err(StationError::TxDataExhausted {
                need,
                available: MAX_TXDATA - self.data.len(),
            });
        }
        let off = self.data.len() as u32;
        self.data.extend_from_slice(payload);
        if let Some(job) = self.get_mut(idx) {
            job.off = TxOff::At(off);
            job.len = need as u8;
        }
        Ok(())
    }

    pub fn payload(&self, idx: TxIdx) -> &[u8] {
        match self.get(idx) {
            Some(job) => match job.off {
                TxOff::At(off) => &self.data[off as usize..off as usize + job.len as usize],
                TxOff::Nil => &[],
            },
            None => &[],
        }
    }

    /// Insert `idx` into antenna `ant`'s list, ordered ascending by `txtime`.
    /// Returns `true` if the job became the new head (caller should re-arm
    /// the antenna's scheduler timer).
    pub fn insert_ordered(&mut self, ant: u8, idx: TxIdx) -> bool {
        let txtime = match self.get(idx) {
            Some(j) => j.txtime,
            None => return false,
        };
        let mut prev: Option<u16> = None;
        let mut cur = self.heads[ant as usize];
        loop {
            match cur {
                TxIdx::End | TxIdx::Nil => break,
                TxIdx::Slot(ci) => {
                    let cur_txtime = self.jobs[ci as usize].as_ref().unwrap().txtime;
                    if cur_txtime > txtime {
                        break;
                    }
                    prev = Some(ci);
                    cur = self.jobs[ci as usize].as_ref().unwrap().next;
                }
            }
        }
        if let Some(job) = self.get_mut(idx) {
            job.next = cur;
        }
        match prev {
            None => {
                self.heads[ant as usize] = idx;
                true
            }
            Some(pi) => {
                self.jobs[pi as usize].as_mut().unwrap().next = idx;
                false
            }
        }
    }

    /// Remove `idx` from antenna `ant`'s list (it must be present). The job
    /// itself is left allocated (not freed) with `next` reset to `Nil`.
    pub fn unlink(&mut self, ant: u8, idx: TxIdx) {
        let target = match idx.slot() {
            Some(s) => s,
            None => return,
        };
        let mut prev: Option<u16> = None;
        let mut cur = self.heads[ant as usize];
        while let TxIdx::Slot(ci) = cur {
            if ci == target {
                let next = self.jobs[ci as usize].as_ref().unwrap().next;
                match prev {
                    None => self.heads[ant as usize] = next,
                    Some(pi) => self.jobs[pi as usize].as_mut().unwrap().next = next,
                }
                self.jobs[ci as usize].as_mut().unwrap().next = TxIdx::Nil;
                return;
            }
            prev = Some(ci);
            cur = self.jobs[ci as usize].as_ref().unwrap().next;
        }
    }

    /// Iterate an antenna's list from head in ascending `txtime` order.
    pub fn iter_antenna(&self, ant: u8) -> impl Iterator<Item = TxIdx> + '_ {
        let mut cur = self.heads[ant as usize];
        std::iter::from_fn(move || match cur {
            TxIdx::Slot(i) => {
                let this = cur;
                cur = self.jobs[i as usize].as_ref().unwrap().next;
                Some(this)
            }
            _ => None,
        })
    }

    /// Free `idx`'s slot and compact the data arena so every other job's
    /// `off` remains valid. `idx` must already be unlinked from any antenna
    /// list.
    pub fn free(&mut self, idx: TxIdx) {
        let slot = match idx.slot() {
            Some(s) => s,
            None => return,
        };
        if let Some(job) = self.jobs[slot as usize].take() {
            if let TxOff::At(off) = job.off {
                let len = job.len as usize;
                let off = off as usize;
                self.data.drain(off..off + len);
                for other in self.jobs.iter_mut().flatten() {
                    if let TxOff::At(other_off) = other.off {
                        if other_off as usize > off {
                            other.off = TxOff::At(other_off - len as u32);
                        }
                    }
                }
            }
        }
    }

    /// Number of slots currently in use.
    pub fn used(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_some()).count()
    }
}

impl Default for TxPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(txtime: i64, len: u8) -> TxJob {
        let mut j = TxJob::new(1, 1, txtime);
        j.len = len;
        j
    }

    #[test]
    fn ordered_insertion_keeps_ascending_txtime() {
        let mut pool = TxPool::new();
        let a = pool.reserve(job(300, 0)).unwrap();
        let b = pool.reserve(job(100, 0)).unwrap();
        let c = pool.reserve(job(200, 0)).unwrap();
        pool.insert_ordered(0, a);
        pool.insert_ordered(0, b);
        pool.insert_ordered(0, c);
        let times: Vec<i64> = pool
            .iter_antenna(0)
            .map(|i| pool.get(i).unwrap().txtime)
            .collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn free_compacts_payload_arena() {
        let mut pool = TxPool::new();
        let a = pool.reserve(job(0, 0)).unwrap();
        let b = pool.reserve(job(0, 0)).unwrap();
        pool.reserve_data(a, &[1, 2, 3]).unwrap();
        pool.reserve_data(b, &[4, 5]).unwrap();
        pool.free(a);
        assert_eq!(pool.payload(b), &[4, 5]);
    }

    #[test]
    fn unlink_then_free_removes_from_pool() {
        let mut pool = TxPool::new();
        let a = pool.reserve(job(10, 0)).unwrap();
        pool.insert_ordered(0, a);
        pool.unlink(0, a);
        pool.free(a);
        assert_eq!(pool.used(), 0);
        assert!(matches!(pool.head(0), TxIdx::End));
    }

    #[test]
    fn pool_exhaustion_is_reported() {
        let mut pool = TxPool::new();
        for _ in 0..pool.capacity() {
            pool.reserve(job(0, 0)).unwrap();
        }
        assert!(pool.reserve(job(0, 0)).is_err());
    }

    use proptest::prelude::*;
    use proptest::proptest;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Add { txtime: i64, payload_len: u8 },
        FreeOldest,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0i64..1_000_000, 0u8..32).prop_map(|(txtime, payload_len)| Op::Add { txtime, payload_len }),
            Just(Op::FreeOldest),
        ]
    }

    proptest! {
        /// spec.md §8 "TX-queue integrity": after any sequence of
        /// add/unlink/free operations, every live job's payload offset
        /// stays valid and every other live job's payload bytes survive a
        /// free's arena compaction untouched.
        #[test]
        fn tx_queue_integrity_under_random_ops(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut pool = TxPool::new();
            let mut live: Vec<(TxIdx, Vec<u8>)> = Vec::new();

            for op in ops {
                match op {
                    Op::Add { txtime, payload_len } => {
                        let payload: Vec<u8> = (0..payload_len).collect();
                        let mut j = TxJob::new(0, 1, txtime);
                        if let Ok(idx) = pool.reserve(j.clone()) {
                            j.len = payload.len() as u8;
                            if pool.reserve_data(idx, &payload).is_ok() {
                                pool.insert_ordered(0, idx);
                                live.push((idx, payload));
                            } else {
                                pool.free(idx);
                            }
                        }
                    }
                    Op::FreeOldest => {
                        if !live.is_empty() {
                            let (idx, _) = live.remove(0);
                            pool.unlink(0, idx);
                            pool.free(idx);
                        }
                    }
                }

                // Invariant: every remaining live job's payload is unchanged
                // by whatever compaction just happened.
                for (idx, payload) in &live {
                    prop_assert_eq!(pool.payload(*idx), payload.as_slice());
                }
                // Invariant: antenna list is exactly the still-live jobs, in
                // ascending txtime order.
                let listed: Vec<TxIdx> = pool.iter_antenna(0).collect();
                prop_assert_eq!(listed.len(), live.len());
                let mut last_txtime = i64::MIN;
                for idx in &listed {
                    let txtime = pool.get(*idx).unwrap().txtime;
                    prop_assert!(txtime >= last_txtime);
                    last_txtime = txtime;
                }
            }
        }
    }
}
