//! S2E: the "station-to-everything" message layer that turns RX jobs into
//! upstream LNS messages and LNS downlink messages into TX jobs. Ported
//! from `s2e.c`/`s2e.h`.

pub mod filter;
pub mod frame;
pub mod messages;
pub mod mirror;
pub mod rps;
pub mod uplink;

use crate::error::{Result, StationError};
use crate::region::Region;
use filter::{JoinEuiFilter, NetIdFilter};
use frame::{dev_addr_netid, parse_frame, FrameKind};

/// Router-config-derived acceptance policy applied to every parsed uplink
/// before it is forwarded: region for DR/frequency legality, plus the
/// JoinEUI/NetID pass-through filters.
pub struct UplinkPolicy {
    pub region: Region,
    pub join_eui_filter: JoinEuiFilter,
    pub netid_filter: NetIdFilter,
}

impl UplinkPolicy {
    pub fn new(region: Region) -> Self {
        UplinkPolicy {
            region,
            join_eui_filter: JoinEuiFilter::default(),
            netid_filter: NetIdFilter::allow_all(),
        }
    }

    /// Parses `pdu`'s MHdr and applies the JoinEUI/NetID filters. Returns
    /// `Ok(None)` for a structurally valid frame the filters reject (the
    /// caller should silently drop it); `Err` for a frame that fails to
    /// parse at all (bad major version or truncated header).
    pub fn accept(&self, pdu: &[u8]) -> Result<Option<FrameKind>> {
        let kind = parse_frame(pdu).map_err(|e| StationError::FrameParseError(format!("{e:?}")))?;
        let passes = match &kind {
            FrameKind::JoinRequest { join_eui, .. } => self.join_eui_filter.passes(*join_eui),
            FrameKind::Rejoin { join_eui } => self.join_eui_filter.passes(*join_eui),
            FrameKind::DataUp { dev_addr, .. } => self.netid_filter.passes(dev_addr_netid(*dev_addr)),
            FrameKind::Proprietary | FrameKind::JoinAccept => true,
        };
        Ok(if passes { Some(kind) } else { None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_frame_outside_joineui_range() {
        let mut policy = UplinkPolicy::new(Region::Eu868);
        policy.join_eui_filter = JoinEuiFilter::new(vec![(0x1000, 0x1FFF)]);
        let mut pdu = vec![0x00u8];
        pdu.extend_from_slice(&0x0001u64.to_le_bytes()); // JoinEUI outside range
        pdu.extend_from_slice(&0u64.to_le_bytes());
        pdu.extend_from_slice(&0u16.to_le_bytes());
        pdu.extend_from_slice(&[0, 0, 0, 0]);
        assert!(policy.accept(&pdu).unwrap().is_none());
    }

    #[test]
    fn accepts_data_frame_under_default_netid_filter() {
        let policy = UplinkPolicy::new(Region::Eu868);
        let mut pdu = vec![0x40u8];
        pdu.extend_from_slice(&0u32.to_le_bytes());
        pdu.push(0x00);
        pdu.extend_from_slice(&0u16.to_le_bytes());
        pdu.extend_from_slice(&[0, 0, 0, 0]);
        assert!(policy.accept(&pdu).unwrap().is_some());
    }
}
