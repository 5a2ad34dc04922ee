//! Mirror-frame suppression: the same uplink is often received by more than
//! one antenna (or, for a multi-chip station, more than one concentrator) in
//! the same dwell. Only the copy with the best link quality is forwarded.
//! Ported from `s2e.c`'s `s2e_addRxjob` duplicate-detection pass.

use crate::txrx::RxJob;

/// A score combining SNR and RSSI the way the original ranks mirrored
/// copies of the same frame: `8*snr - rssi`, so a 1dB SNR improvement
/// outweighs an 8dB RSSI difference (SNR is the more reliable link-quality
/// indicator once a receiver is below its noise floor).
fn link_score(job: &RxJob) -> i32 {
    8 * job.snr as i32 - job.rssi as i32
}

/// Two jobs are mirrors of each other if they carry the same datarate and
/// an identical payload (length first, as a cheap short-circuit, since
/// comparing a mismatched length as bytes would be wasted work).
fn is_mirror(a_dr: u8, a_payload: &[u8], b: &RxJob, b_payload: &[u8]) -> bool {
    a_dr == b.dr && a_payload.len() == b_payload.len() && a_payload == b_payload
}

/// Scans `candidates` (each paired with its payload) for any received copy
/// of `(dr, payload)` and returns the index of the best-scoring one if
/// found. The caller uses this both to decide whether an incoming frame is
/// a mirror of something already queued, and which of the two to keep.
pub fn find_best_mirror<'a>(dr: u8, payload: &[u8], candidates: &'a [(RxJob, Vec<u8>)]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, (job, job_payload))| is_mirror(dr, payload, job, job_payload))
        .max_by_key(|(_, (job, _))| link_score(job))
        .map(|(idx, _)| idx)
}

/// Given a newly arrived `(job, payload)` and the set of jobs already queued
/// for the current uplink, decides whether to keep the new arrival. Returns
/// `true` if the new job strictly improves on every existing mirror (or no
/// mirror exists yet), `false` if an existing queued copy is as good or
/// better and the new arrival should be dropped.
pub fn should_replace(new_job: &RxJob, new_payload: &[u8], queued: &[(RxJob, Vec<u8>)]) -> bool {
    match find_best_mirror(new_job.dr, new_payload, queued) {
        None => true,
        Some(idx) => link_score(new_job) > link_score(&queued[idx].0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(rssi: i16, snr: i8, dr: u8) -> RxJob {
        RxJob {
            xtime: 0,
            rssi,
            snr,
            dr,
            freq: 868_100_000,
            off: 0,
            len: 0,
        }
    }

    #[test]
    fn no_mirror_means_always_keep() {
        let queued = vec![];
        assert!(should_replace(&job(-80, 5, 5), &[1, 2, 3], &queued));
    }

    #[test]
    fn higher_snr_wins_even_with_worse_rssi() {
        let queued = vec![(job(-60, 2, 5), vec![1, 2, 3])];
        // new: snr 9 vs rssi -60 queued score: 8*2-(-60)=76; new 8*9-(-90)=162
        assert!(should_replace(&job(-90, 9, 5), &[1, 2, 3], &queued));
    }

    #[test]
    fn worse_score_is_not_replaced() {
        let queued = vec![(job(-60, 9, 5), vec![1, 2, 3])];
        assert!(!should_replace(&job(-60, 2, 5), &[1, 2, 3], &queued));
    }

    #[test]
    fn different_payload_is_not_a_mirror() {
        let queued = vec![(job(-60, 2, 5), vec![9, 9, 9])];
        assert!(should_replace(&job(-90, 1, 5), &[1, 2, 3], &queued));
    }
}
