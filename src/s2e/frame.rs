//! LoRaWAN MHdr-level frame dispatch. The core never verifies a MIC or
//! decrypts `FRMPayload` (out of scope here) — it only inspects enough
//! header structure to route, filter, and mirror-suppress frames.
//! Ported from `s2e.c`'s `s2e_parse_rx`/`s2e_forwardUplink` header-decode
//! prefix.

/// LoRaWAN MHDR MType values (top 3 bits of the first octet).
const MTYPE_JOIN_REQUEST: u8 = 0b000;
const MTYPE_JOIN_ACCEPT: u8 = 0b001;
const MTYPE_UNCONFIRMED_UP: u8 = 0b010;
const MTYPE_CONFIRMED_UP: u8 = 0b100;
const MTYPE_REJOIN: u8 = 0b110;
const MTYPE_PROPRIETARY: u8 = 0b111;

fn mtype(mhdr: u8) -> u8 {
    mhdr >> 5
}
fn major(mhdr: u8) -> u8 {
    mhdr & 0x3
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    JoinRequest {
        join_eui: u64,
        dev_eui: u64,
        dev_nonce: u16,
    },
    /// Rejoin-request (type 0/1/2) — only the `JoinEUI` header field is
    /// inspected, same as a join-request, for filtering purposes.
    Rejoin {
        join_eui: u64,
    },
    DataUp {
        dev_addr: u32,
        fctrl: u8,
        fcnt: u16,
        fopts: Vec<u8>,
        fport: Option<u8>,
        frm_payload: Vec<u8>,
        mic: u32,
        confirmed: bool,
    },
    /// Proprietary (MType 0b111): passed through as opaque hex, undecoded.
    Proprietary,
    /// Join-accept: should only ever arrive in loopback/test traffic (a
    /// real join-accept flows station->device, not device->station) but is
    /// accepted and passed through rather than dropped.
    JoinAccept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    TooShort,
    BadMajorVersion,
}

/// Parses `pdu`'s MHdr and routes to the matching [`FrameKind`]. Frames
/// with an unsupported major version or insufficient length for their
/// MType are rejected outright (§4.2 "Frames with bad major version or too
/// short length are dropped with a debug log" — the caller owns the log).
pub fn parse_frame(pdu: &[u8]) -> Result<FrameKind, FrameError> {
    let mhdr = *pdu.first().ok_or(FrameError::TooShort)?;
    if major(mhdr) != 0 {
        return Err(FrameError::BadMajorVersion);
    }
    match mtype(mhdr) {
        MTYPE_JOIN_REQUEST => {
            if pdu.len() < 1 + 8 + 8 + 2 + 4 {
                return Err(FrameError::TooShort);
            }
            let join_eui = u64::from_le_bytes(pdu[1..9].try_into().unwrap());
            let dev_eui = u64::from_le_bytes(pdu[9..17].try_into().unwrap());
            let dev_nonce = u16::from_le_bytes(pdu[17..19].try_into().unwrap());
            Ok(FrameKind::JoinRequest { join_eui, dev_eui, dev_nonce })
        }
        MTYPE_REJOIN => {
            // RejoinType 1 carries JoinEUI at a different offset than 0/2;
            // the filter only needs the field present in all three: take
            // the common minimal layout (type byte + JoinEUI at [2..10]).
            if pdu.len() < 1 + 1 + 8 + 4 {
                return Err(FrameError::TooShort);
            }
            let join_eui = u64::from_le_bytes(pdu[2..10].try_into().unwrap());
            Ok(FrameKind::Rejoin { join_eui })
        }
        MTYPE_UNCONFIRMED_UP | MTYPE_CONFIRMED_UP => {
            if pdu.len() < 1 + 4 + 1 + 2 + 4 {
                return Err(FrameError::TooShort);
            }
            let dev_addr = u32::from_le_bytes(pdu[1..5].try_into().unwrap());
            let fctrl = pdu[5];
            let fcnt = u16::from_le_bytes(pdu[6..8].try_into().unwrap());
            let fopts_len = (fctrl & 0x0F) as usize;
            let mut off = 8;
            if pdu.len() < off + fopts_len + 4 {
                return Err(FrameError::TooShort);
            }
            let fopts = pdu[off..off + fopts_len].to_vec();
            off += fopts_len;
            let body_end = pdu.len() - 4;
            let mic = u32::from_le_bytes(pdu[body_end..].try_into().unwrap());
            let (fport, frm_payload) = if off < body_end {
                (Some(pdu[off]), pdu[off + 1..body_end].to_vec())
            } else {
                (None, Vec::new())
            };
            Ok(FrameKind::DataUp {
                dev_addr,
                fctrl,
                fcnt,
                fopts,
                fport,
                frm_payload,
                mic,
                confirmed: mtype(mhdr) == MTYPE_CONFIRMED_UP,
            })
        }
        MTYPE_JOIN_ACCEPT => Ok(FrameKind::JoinAccept),
        MTYPE_PROPRIETARY => Ok(FrameKind::Proprietary),
        _ => Err(FrameError::BadMajorVersion),
    }
}

/// `NetID` is the top 7 bits of a `DevAddr` (`LoRaWAN §6.1.1`).
pub fn dev_addr_netid(dev_addr: u32) -> u8 {
    ((dev_addr >> 25) & 0x7F) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_request_pdu() -> Vec<u8> {
        let mut pdu = vec![0x00u8]; // MHDR: JoinRequest, major 0
        pdu.extend_from_slice(&0x0102030405060708u64.to_le_bytes()); // JoinEUI
        pdu.extend_from_slice(&0x1112131415161718u64.to_le_bytes()); // DevEUI
        pdu.extend_from_slice(&0xAABBu16.to_le_bytes()); // DevNonce
        pdu.extend_from_slice(&[0, 0, 0, 0]); // MIC
        pdu
    }

    #[test]
    fn parses_join_request_fields() {
        match parse_frame(&join_request_pdu()).unwrap() {
            FrameKind::JoinRequest { join_eui, dev_eui, dev_nonce } => {
                assert_eq!(join_eui, 0x0102030405060708);
                assert_eq!(dev_eui, 0x1112131415161718);
                assert_eq!(dev_nonce, 0xAABB);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_major_version() {
        let mut pdu = join_request_pdu();
        pdu[0] |= 0x03;
        assert_eq!(parse_frame(&pdu), Err(FrameError::BadMajorVersion));
    }

    #[test]
    fn rejects_too_short_frame() {
        assert_eq!(parse_frame(&[0x40]), Err(FrameError::TooShort));
    }

    #[test]
    fn parses_data_up_with_fopts_and_fport() {
        let mut pdu = vec![0x40u8]; // UnconfirmedDataUp, major 0
        pdu.extend_from_slice(&0xAABBCCDDu32.to_le_bytes()); // DevAddr
        pdu.push(0x01); // FCtrl: FOptsLen=1
        pdu.extend_from_slice(&5u16.to_le_bytes()); // FCnt
        pdu.push(0x42); // FOpts
        pdu.push(1); // FPort
        pdu.extend_from_slice(&[0xDE, 0xAD]); // FRMPayload
        pdu.extend_from_slice(&[1, 2, 3, 4]); // MIC
        match parse_frame(&pdu).unwrap() {
            FrameKind::DataUp { dev_addr, fopts, fport, frm_payload, confirmed, .. } => {
                assert_eq!(dev_addr, 0xAABBCCDD);
                assert_eq!(fopts, vec![0x42]);
                assert_eq!(fport, Some(1));
                assert_eq!(frm_payload, vec![0xDE, 0xAD]);
                assert!(!confirmed);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn netid_is_top_7_bits_of_devaddr() {
        assert_eq!(dev_addr_netid(0xFE000000), 0x7F);
        assert_eq!(dev_addr_netid(0x00000000), 0);
    }

    #[test]
    fn proprietary_and_join_accept_pass_through() {
        assert_eq!(parse_frame(&[0xE0, 1, 2, 3]).unwrap(), FrameKind::Proprietary);
        assert_eq!(parse_frame(&[0x20, 1, 2, 3]).unwrap(), FrameKind::JoinAccept);
    }
}
