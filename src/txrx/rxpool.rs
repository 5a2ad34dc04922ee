//! RX job queue: a sliding FIFO over a shared byte arena. Ported from
//! `xq.h`'s `rxq_t`. Unlike the TX pool, RX jobs never need per-antenna
//! ordering or random-access free — they are produced by the concentrator
//! in arrival order and consumed by S2E uplink handling in the same order,
//! so a simple ring buffer with a `first`/`next` cursor pair suffices.

use crate::constants::{MAX_RXDATA, MAX_RXJOBS};
use crate::error::{Result, StationError};

#[derive(Debug, Clone)]
pub struct RxJob {
    pub xtime: i64,
    pub rssi: i16,
    pub snr: i8,
    pub dr: u8,
    pub freq: u32,
    pub off: u32,
    pub len: u8,
}

pub struct RxPool {
    jobs: Vec<RxJob>,
    data: Vec<u8>,
    /// Index of the oldest not-yet-consumed job.
    first: usize,
}

impl RxPool {
    pub fn new() -> Self {
        RxPool {
            jobs: Vec::with_capacity(MAX_RXJOBS),
            data: Vec::new(),
            first: 0,
        }
    }

    /// Append a freshly received frame. Drops the oldest unconsumed job if
    /// the queue is full, mirroring the original's fixed ring behavior
    /// (a gateway that cannot keep up sheds old uplinks rather than new
    /// ones, since new ones are more likely still actionable).
    pub fn push(&mut self, payload: &[u8], xtime: i64, rssi: i16, snr: i8, dr: u8, freq: u32) -> Result<()> {
        if payload.len() > u8::MAX as usize {
            return Err(StationError::RxDataExhausted {
                need: payload.len(),
                available: u8::MAX as usize,
            });
        }
        if self.jobs.len() - self.first >= MAX_RXJOBS {
            self.pop();
        }
        if self.data.len() + payload.len() > MAX_RXDATA {
            self.compact();
            if self.data.len() + payload.len() > MAX_RXDATA {
                self.pop();
            }
        }
        let off = self.data.len() as u32;
        self.data.extend_from_slice(payload);
        self.jobs.push(RxJob {
            xtime,
            rssi,
            snr,
            dr,
            freq,
            off,
            len: payload.len() as u8,
        });
        Ok(())
    }

    /// Pop and return the oldest unconsumed job, together with its payload.
    pub fn pop(&mut self) -> Option<(RxJob, Vec<u8>)> {
        if self.first >= self.jobs.len() {
            return None;
        }
        let job = self.jobs[self.first].clone();
        let payload = self.data[job.off as usize..job.off as usize + job.len as usize].to_vec();
        self.first += 1;
        if self.first == self.jobs.len() {
            self.jobs.clear();
            self.data.clear();
            self.first = 0;
        }
        Some((job, payload))
    }

    pub fn len(&self) -> usize {
        self.jobs.len() - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop consumed jobs' bytes and slide the data arena down to reclaim
    /// space without disturbing unconsumed jobs' relative order.
    fn compact(&mut self) {
        if self.first == 0 {
            return;
        }
        let drop_bytes = self
            .jobs
            .get(self.first - 1)
            .map(|j| j.off as usize + j.len as usize)
            .unwrap_or(0);
        self.data.drain(0..drop_bytes);
        for job in &mut self.jobs[self.first..] {
            job.off -= drop_bytes as u32;
        }
        self.jobs.drain(0..self.first);
        self.first = 0;
    }
}

impl Default for RxPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let mut pool = RxPool::new();
        pool.push(&[1, 2], 100, -80, 7, 5, 868_100_000).unwrap();
        pool.push(&[3, 4, 5], 200, -70, 9, 5, 868_300_000).unwrap();
        let (j0, p0) = pool.pop().unwrap();
        assert_eq!(j0.xtime, 100);
        assert_eq!(p0, vec![1, 2]);
        let (j1, p1) = pool.pop().unwrap();
        assert_eq!(j1.xtime, 200);
        assert_eq!(p1, vec![3, 4, 5]);
        assert!(pool.pop().is_none());
    }

    #[test]
    fn overflow_sheds_oldest() {
        let mut pool = RxPool::new();
        for i in 0..MAX_RXJOBS + 2 {
            pool.push(&[i as u8], i as i64, 0, 0, 0, 0).unwrap();
        }
        assert!(pool.len() <= MAX_RXJOBS);
        let (oldest, _) = pool.pop().unwrap();
        assert!(oldest.xtime >= 2);
    }
}
