//! Assembles the JSON messages sent upstream for a received frame, joining
//! a committed [`RxJob`]/payload pair with the [`FrameKind`] parsed from it.
//! Ported from `s2e.c`'s `s2e_forwardUplink`/`s2e_forwardJoinRequest`.

use crate::s2e::frame::FrameKind;
use crate::s2e::messages::{JoinRequestInfo, UpInfo};
use crate::txrx::RxJob;

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Builds the `up` message body for any uplink that isn't a join-request
/// (data frames, rejoins, proprietary). `gpstime` is the GPS-epoch
/// microsecond timestamp already resolved by the time-sync engine for
/// `job.xtime`; `rctx` identifies the receiving antenna/session.
pub fn build_up_info(job: &RxJob, payload: &[u8], diid: i64, rctx: i64, gpstime: i64) -> UpInfo {
    UpInfo {
        dC: 0,
        diid,
        data: hex_encode(payload),
        rctx,
        xtime: job.xtime,
        gpstime,
        rssi: job.rssi,
        snr: job.snr as f32 / 4.0,
        dr: job.dr,
        freq: job.freq,
    }
}

/// Builds the `jreq` message body for a join-request. Returns `None` if
/// `kind` is not a [`FrameKind::JoinRequest`] (the caller is expected to
/// have already dispatched on frame kind; this just keeps the mapping
/// total rather than panicking on misuse).
pub fn build_join_request_info(job: &RxJob, kind: &FrameKind) -> Option<JoinRequestInfo> {
    match kind {
        FrameKind::JoinRequest { join_eui, dev_eui, dev_nonce } => Some(JoinRequestInfo {
            mhdr: 0x00,
            join_eui: format!("{join_eui:016X}"),
            dev_eui: format!("{dev_eui:016X}"),
            dev_nonce: *dev_nonce,
            xtime: job.xtime,
            rssi: job.rssi,
            snr: job.snr as f32 / 4.0,
            dr: job.dr,
            freq: job.freq,
        }),
        _ => None,
    }
}
