//! Regional regulatory policy: which `Region` a station operates in decides
//! default/alternate TX power, whether duty-cycle is tracked by EU868
//! sub-band or per-channel, and whether a clear-channel assessment is
//! required before transmitting. Ported from `regions.c`'s per-region
//! `s2ctx_t` function-pointer table — a Rust trait object stands in for the
//! original's function pointers.

pub mod beacon;
pub mod challoc;
pub mod dr;

use crate::scheduler::dutycycle::DutyCycleState;

/// Outcome of a `can_tx` regulatory check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanTx {
    /// Transmission is permitted unconditionally.
    Yes,
    /// Transmission requires a successful CCA/LBT scan first.
    NeedsCca,
    /// Duty-cycle or channel restrictions forbid transmission right now.
    No,
}

/// A region's regulatory behavior. Implementors are stateless policy
/// objects; all duty-cycle bookkeeping lives in the caller-owned
/// [`DutyCycleState`] so one policy instance can serve every antenna.
pub trait RegionPolicy: Send + Sync {
    fn region(&self) -> Region;

    /// Default TX power (centi-dBm) for the given downlink frequency.
    fn default_txpow(&self, freq: u32) -> i16;

    /// Alternate (higher) TX power available in a sub-band-specific
    /// allowance, if any (e.g. EU868's 869.4-869.65MHz 27dBm band).
    fn alt_txpow(&self, freq: u32) -> Option<i16> {
        let _ = freq;
        None
    }

    /// Whether this region tracks duty cycle by EU868 sub-band, by
    /// individual channel, or not at all.
    fn dc_mode(&self) -> DcMode;

    /// Regulatory permission to transmit `airtime` µs at `freq`/local
    /// channel `chnl` at time `txtime`, given the antenna's duty-cycle
    /// bookkeeping.
    fn can_tx(&self, dc: &DutyCycleState, freq: u32, chnl: usize, txtime: i64) -> CanTx {
        match self.dc_mode() {
            DcMode::None => CanTx::Yes,
            DcMode::Eu868SubBand => {
                if dc.can_tx_eu868(freq, txtime) {
                    CanTx::Yes
                } else {
                    CanTx::No
                }
            }
            DcMode::PerChannelCca => {
                let free_at = dc.channel_free_at(chnl);
                if free_at == crate::constants::USTIME_MAX || (free_at != crate::constants::USTIME_MIN && txtime < free_at)
                {
                    CanTx::No
                } else {
                    CanTx::NeedsCca
                }
            }
        }
    }

    /// Per-channel duty-cycle divisor this region enforces (`0` disables
    /// per-channel tracking even if [`DcMode::PerChannelCca`] is selected
    /// for CCA purposes alone).
    fn chnl_rate(&self) -> i64 {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcMode {
    None,
    Eu868SubBand,
    PerChannelCca,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Eu868,
    Il915,
    Kr920,
    As923_1,
    Us915,
    Au915,
    Unknown,
}

impl Region {
    /// Parses the region tag a `router_config` message carries (e.g.
    /// `"EU863"`, `"EU868"`, `"AS923-1"`, `"KR920"`). Unrecognised tags map
    /// to [`Region::Unknown`], matching `regions.c`'s fallback behavior
    /// (14dBm default power, no duty cycle) rather than an error — a
    /// station should still forward uplinks even for a region it can't
    /// fully police downlink power/DC for.
    pub fn parse(tag: &str) -> Region {
        match tag.to_ascii_uppercase().as_str() {
            "EU868" | "EU863" => Region::Eu868,
            "IL915" => Region::Il915,
            "KR920" => Region::Kr920,
            "AS923" | "AS923-1" => Region::As923_1,
            "US915" => Region::Us915,
            "AU915" | "AU915-928" => Region::Au915,
            _ => Region::Unknown,
        }
    }

    pub fn policy(self) -> Box<dyn RegionPolicy> {
        match self {
            Region::Eu868 => Box::new(Eu868Policy),
            Region::Il915 => Box::new(Il915Policy),
            Region::Kr920 => Box::new(Kr920Policy),
            Region::As923_1 => Box::new(As923_1Policy),
            Region::Us915 => Box::new(Us915Policy),
            Region::Au915 => Box::new(Au915Policy),
            Region::Unknown => Box::new(UnknownPolicy),
        }
    }
}

struct Eu868Policy;
impl RegionPolicy for Eu868Policy {
    fn region(&self) -> Region {
        Region::Eu868
    }
    fn default_txpow(&self, _freq: u32) -> i16 {
        1600
    }
    fn alt_txpow(&self, freq: u32) -> Option<i16> {
        if (869_400_000..=869_650_000).contains(&freq) {
            Some(2700)
        } else {
            None
        }
    }
    fn dc_mode(&self) -> DcMode {
        DcMode::Eu868SubBand
    }
}

struct Il915Policy;
impl RegionPolicy for Il915Policy {
    fn region(&self) -> Region {
        Region::Il915
    }
    fn default_txpow(&self, _freq: u32) -> i16 {
        1600
    }
    fn dc_mode(&self) -> DcMode {
        DcMode::None
    }
}

struct Kr920Policy;
impl RegionPolicy for Kr920Policy {
    fn region(&self) -> Region {
        Region::Kr920
    }
    fn default_txpow(&self, _freq: u32) -> i16 {
        1400
    }
    fn dc_mode(&self) -> DcMode {
        DcMode::PerChannelCca
    }
    fn chnl_rate(&self) -> i64 {
        50 // 2%
    }
}

struct As923_1Policy;
impl RegionPolicy for As923_1Policy {
    fn region(&self) -> Region {
        Region::As923_1
    }
    fn default_txpow(&self, _freq: u32) -> i16 {
        1600
    }
    fn dc_mode(&self) -> DcMode {
        DcMode::PerChannelCca
    }
    fn chnl_rate(&self) -> i64 {
        10 // 10%
    }
}

struct Us915Policy;
impl RegionPolicy for Us915Policy {
    fn region(&self) -> Region {
        Region::Us915
    }
    fn default_txpow(&self, _freq: u32) -> i16 {
        2600
    }
    fn dc_mode(&self) -> DcMode {
        DcMode::None
    }
}

struct Au915Policy;
impl RegionPolicy for Au915Policy {
    fn region(&self) -> Region {
        Region::Au915
    }
    fn default_txpow(&self, _freq: u32) -> i16 {
        3000
    }
    fn dc_mode(&self) -> DcMode {
        DcMode::None
    }
}

struct UnknownPolicy;
impl RegionPolicy for UnknownPolicy {
    fn region(&self) -> Region {
        Region::Unknown
    }
    fn default_txpow(&self, _freq: u32) -> i16 {
        1400
    }
    fn dc_mode(&self) -> DcMode {
        DcMode::None
    }
}
