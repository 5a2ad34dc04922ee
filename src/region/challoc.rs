//! Per-concentrator channel allocation: assigns each upstream channel to one
//! of the concentrator's two RF front-ends (RFEs) and an IF slot, subject to
//! the span constraint each front-end's fixed-IF architecture imposes.
//! Ported from `original_source/src/ral.c`'s `challoc`/`rfe` centre-picking
//! pass (`CHALLOC_CH`/`CHALLOC_CHIP_DONE` callback events).

use crate::error::{Result, StationError};
use crate::s2e::rps::{Rps, BW125, BW250, BW500, FSK};

/// Maximum IF offset from its RFE centre a channel of a given bandwidth may
/// sit at and still be receivable (`ral.h` `RAL_CHANLIM_*`).
const MAX_COFF_125: i64 = 400_000;
const MAX_COFF_250: i64 = 375_000;
const MAX_COFF_500: i64 = 300_000;

fn max_coff(rps: Rps) -> i64 {
    if rps.is_fsk() {
        MAX_COFF_125
    } else {
        match rps.bw() {
            BW125 => MAX_COFF_125,
            BW250 => MAX_COFF_250,
            BW500 => MAX_COFF_500,
            _ => MAX_COFF_125,
        }
    }
}

/// One concentrator channel, assigned an IF slot (0..7 multi-SF, 8
/// fast-LoRa, 9 FSK) and which of the chip's two RFEs it is received on.
#[derive(Debug, Clone, Copy)]
pub struct ChannelAlloc {
    pub freq: u32,
    pub rps: Rps,
    pub if_slot: u8,
    pub rfe: u8,
}

/// Result of allocating one concentrator chip's worth of channels: the
/// per-channel IF/RFE assignment plus the inferred RFE centre frequencies
/// (`CHALLOC_CHIP_DONE`'s payload).
#[derive(Debug, Clone)]
pub struct ChipAllocation {
    pub channels: Vec<ChannelAlloc>,
    pub rfe_centers: [u32; 2],
}

/// Assigns up to 8 multi-SF 125kHz channels (IF slots 0..7), one fast-LoRa
/// channel at 250/500kHz (slot 8), and one FSK channel (slot 9) from
/// `channels` to this chip's two RFEs. Channels are first split into two
/// frequency clusters at the largest inter-channel gap (a single RFE is
/// used if everything fits within one front-end's span); each cluster's
/// mean frequency becomes that RFE's centre. Fails if any channel's offset
/// from its assigned centre exceeds its modulation's span limit.
pub fn allocate_chip(channels: &[(u32, Rps)]) -> Result<ChipAllocation> {
    let multi_sf: Vec<(u32, Rps)> = channels
        .iter()
        .copied()
        .filter(|(_, r)| !r.is_fsk() && r.bw() == BW125)
        .take(8)
        .collect();
    let fast_lora: Option<(u32, Rps)> = channels
        .iter()
        .copied()
        .find(|(_, r)| !r.is_fsk() && (r.bw() == BW250 || r.bw() == BW500));
    let fsk: Option<(u32, Rps)> = channels.iter().copied().find(|(_, r)| r.is_fsk());

    let mut all_freqs: Vec<u32> = multi_sf.iter().map(|(f, _)| *f).collect();
    all_freqs.extend(fast_lora.iter().map(|(f, _)| *f));
    all_freqs.extend(fsk.iter().map(|(f, _)| *f));
    if all_freqs.is_empty() {
        return Ok(ChipAllocation {
            channels: Vec::new(),
            rfe_centers: [0, 0],
        });
    }

    let (cluster_a, cluster_b) = split_into_clusters(&all_freqs);
    let center_a = mean(&cluster_a);
    let center_b = if cluster_b.is_empty() { center_a } else { mean(&cluster_b) };

    let rfe_of = |freq: u32| -> (u8, u32) {
        if cluster_b.is_empty() || cluster_a.contains(&freq) {
            (0, center_a)
        } else {
            (1, center_b)
        }
    };

    let mut out = Vec::with_capacity(multi_sf.len() + 2);
    for (slot, &(freq, rps)) in multi_sf.iter().enumerate() {
        let (rfe, center) = rfe_of(freq);
        check_span(freq, center, rps)?;
        out.push(ChannelAlloc { freq, rps, if_slot: slot as u8, rfe });
    }
    if let Some((freq, rps)) = fast_lora {
        let (rfe, center) = rfe_of(freq);
        check_span(freq, center, rps)?;
        out.push(ChannelAlloc { freq, rps, if_slot: 8, rfe });
    }
    if let Some((freq, rps)) = fsk {
        let (rfe, center) = rfe_of(freq);
        check_span(freq, center, rps)?;
        out.push(ChannelAlloc { freq, rps, if_slot: 9, rfe });
    }

    Ok(ChipAllocation {
        channels: out,
        rfe_centers: [center_a, center_b],
    })
}

fn check_span(freq: u32, center: u32, rps: Rps) -> Result<()> {
    let off = (freq as i64 - center as i64).abs();
    if off > max_coff(rps) {
        return Err(StationError::ConfigFatal(format!(
            "channel allocation failed: {freq}Hz is {off}Hz from RFE centre {center}Hz, exceeds span limit"
        )));
    }
    Ok(())
}

fn mean(freqs: &[u32]) -> u32 {
    (freqs.iter().map(|&f| f as u64).sum::<u64>() / freqs.len() as u64) as u32
}

/// Splits sorted frequencies into two clusters at the largest gap, so each
/// RFE covers a contiguous frequency range. Returns an empty second cluster
/// when everything fits on a single front-end (no gap exceeds the full-band
/// 125kHz span limit, i.e. splitting wouldn't help).
fn split_into_clusters(freqs: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let mut sorted = freqs.to_vec();
    sorted.sort_unstable();
    if sorted.len() < 2 {
        return (sorted, Vec::new());
    }
    let mut best_gap = 0i64;
    let mut split_at = 0;
    for i in 1..sorted.len() {
        let gap = sorted[i] as i64 - sorted[i - 1] as i64;
        if gap > best_gap {
            best_gap = gap;
            split_at = i;
        }
    }
    if best_gap <= 2 * MAX_COFF_125 || split_at == 0 {
        return (sorted, Vec::new());
    }
    let b = sorted.split_off(split_at);
    (sorted, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2e::rps::SF7;

    #[test]
    fn single_cluster_when_everything_fits_one_rfe() {
        let channels = vec![
            (868_100_000, Rps::make(SF7, BW125)),
            (868_300_000, Rps::make(SF7, BW125)),
            (868_500_000, Rps::make(SF7, BW125)),
        ];
        let alloc = allocate_chip(&channels).unwrap();
        assert!(alloc.channels.iter().all(|c| c.rfe == 0));
    }

    #[test]
    fn wide_spread_splits_across_two_rfes() {
        let mut channels = Vec::new();
        for f in [863_000_000u32, 863_200_000, 863_400_000] {
            channels.push((f, Rps::make(SF7, BW125)));
        }
        for f in [868_000_000u32, 868_200_000, 868_400_000] {
            channels.push((f, Rps::make(SF7, BW125)));
        }
        let alloc = allocate_chip(&channels).unwrap();
        let rfes: std::collections::HashSet<u8> = alloc.channels.iter().map(|c| c.rfe).collect();
        assert_eq!(rfes.len(), 2);
    }

    #[test]
    fn out_of_span_channel_is_rejected() {
        let channels = vec![
            (868_100_000, Rps::make(SF7, BW125)),
            (869_900_000, Rps::make(SF7, BW500)),
        ];
        assert!(allocate_chip(&channels).is_err());
    }
}
