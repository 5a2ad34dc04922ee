//! Clock-drift quantile statistics, shared by the MCU/concentrator and PPS
//! drift rings. Ported from `timesync.c`'s `drift_stats`/`log_drift_stats`.

use crate::constants::{IPPM_SCALE, N_DRIFTS, N_SYNC_QUAL, PPM};

/// Encode a drift ratio (`dus/dxc`, 1.0 == perfectly locked) as deci-ppm.
pub fn encode_drift_ppm(ratio: f64) -> i64 {
    ((ratio - 1.0) * (PPM as f64) * (IPPM_SCALE as f64)).round() as i64
}

/// Inverse of [`encode_drift_ppm`]: deci-ppm back to a drift ratio.
pub fn decode_drift_ppm(scaled: i64) -> f64 {
    1.0 + (scaled as f64) / (PPM as f64 * IPPM_SCALE as f64)
}

/// Deci-ppm to plain ppm, for reporting.
pub fn decode_ppm(scaled: i64) -> f64 {
    scaled as f64 / IPPM_SCALE as f64
}

#[derive(Debug, Clone, Copy)]
pub struct DriftQuantiles {
    pub qmin: i64,
    pub q50: i64,
    pub q80: i64,
    pub qmax: i64,
}

/// A fixed-size ring of the most recent drift samples (deci-ppm), supporting
/// quantile queries over `|sample|`-sorted order, matching `cmp_abs_int`.
/// `N` is the ring capacity: `N_DRIFTS` for the MCU/PPS drift rings,
/// `N_SYNC_QUAL` for the sync-quality acceptance ring.
#[derive(Debug, Clone)]
pub struct DriftRing<const N: usize> {
    samples: [i64; N],
    widx: usize,
}

impl<const N: usize> DriftRing<N> {
    pub fn new() -> Self {
        DriftRing {
            samples: [0; N],
            widx: 0,
        }
    }

    /// Push a sample. Returns `true` when the ring just wrapped (i.e. a
    /// fresh full window is available for quantile recomputation).
    pub fn push(&mut self, sample: i64) -> bool {
        self.samples[self.widx] = sample;
        self.widx = (self.widx + 1) % N;
        self.widx == 0
    }

    pub fn sum(&self) -> i64 {
        self.samples.iter().sum()
    }

    /// Quantile `q` (percent) over samples sorted by absolute value,
    /// matching the original's `sorted[(q*N+50)/100]` index rule.
    pub fn quantile_abs(&self, q: usize) -> i64 {
        let mut sorted = self.samples;
        sorted.sort_by_key(|v| v.abs());
        let idx = (q * N + 50) / 100;
        sorted[idx.min(N - 1)]
    }

    pub fn quantiles(&self) -> DriftQuantiles {
        let mut sorted = self.samples;
        sorted.sort_by_key(|v| v.abs());
        DriftQuantiles {
            qmin: sorted[0],
            q50: sorted[N / 2],
            q80: sorted[(N * 80 + 50) / 100],
            qmax: sorted[N - 1],
        }
    }
}

impl<const N: usize> Default for DriftRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub type McuDriftRing = DriftRing<N_DRIFTS>;
pub type SyncQualRing = DriftRing<N_SYNC_QUAL>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_ppm_round_trips() {
        let scaled = encode_drift_ppm(1.00002);
        let back = decode_drift_ppm(scaled);
        assert!((back - 1.00002).abs() < 1e-6);
    }

    #[test]
    fn quantile_is_abs_sorted() {
        let mut ring: McuDriftRing = DriftRing::new();
        for v in [-50, 10, -5, 100, -1, 2, 3, 4, 5, 6, 7, 8, 9, 11, 12, 13, 14, 15, 16, 17] {
            ring.push(v);
        }
        let q = ring.quantile_abs(90);
        assert!(q == 100 || q == -50);
    }
}
