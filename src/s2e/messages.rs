//! WebSocket message bodies exchanged with the LNS, tagged on a `msgtype`
//! field the way the original's `s2e.c` `xprintf`/`uj_*` JSON plumbing
//! reads/writes them. Encoding lives entirely here so the rest of `s2e`
//! works with plain Rust values, not `serde_json::Value` trees.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages the LNS sends down to this station.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "msgtype")]
pub enum DownMessage {
    #[serde(rename = "router_config")]
    RouterConfig(RouterConfig),
    #[serde(rename = "dnmsg")]
    Dnmsg(Dnmsg),
    #[serde(rename = "dnsched")]
    Dnsched(Dnsched),
    /// Legacy pre-scheduling downlink frame format, kept for LNS
    /// implementations that haven't moved to `dnmsg`/`dnsched`.
    #[serde(rename = "dnframe")]
    DnframeLegacy(DnframeLegacy),
    #[serde(rename = "timesync")]
    Timesync(TimesyncDown),
    #[serde(rename = "runcmd")]
    RunCmd(RunCmd),
    #[serde(rename = "rmtsh")]
    RmtSh(RmtSh),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    pub region: String,
    #[serde(default)]
    pub join_eui: Vec<(u64, u64)>,
    #[serde(default)]
    pub netid: Vec<u32>,
    #[serde(default)]
    pub freq_range: Option<(u32, u32)>,
    #[serde(default)]
    pub drs: Vec<(u8, u8, u8)>,
    #[serde(default)]
    pub sx1301_conf: Vec<Value>,
    #[serde(default)]
    pub nocca: bool,
    #[serde(default)]
    pub nodc: bool,
    #[serde(default)]
    pub nodwell: bool,
    #[serde(default)]
    pub beacon: Option<BeaconParams>,
}

/// Beacon parameters a `router_config` may carry: enabling beacon requires
/// both a data rate and the rotating frequency set.
#[derive(Debug, Clone, Deserialize)]
pub struct BeaconParams {
    pub dr: u8,
    pub freqs: Vec<u32>,
}

/// An immediate-transmit downlink, addressed by raw `rctx`/`xtime` rather
/// than a pre-resolved schedule slot.
#[derive(Debug, Clone, Deserialize)]
pub struct Dnmsg(pub DnFrame);

/// A scheduled downlink: carries the same frame fields as [`Dnmsg`] plus an
/// absolute GPS time the LNS wants it transmitted at.
#[derive(Debug, Clone, Deserialize)]
pub struct Dnsched {
    #[serde(flatten)]
    pub frame: DnFrame,
    pub gpstime: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(non_snake_case)]
pub struct DnFrame {
    pub dC: u8,
    pub diid: i64,
    pub pdu: String,
    pub rctx: i64,
    #[serde(default)]
    pub xtime: i64,
    /// RX1 (or class C immediate) downlink frequency, Hz.
    #[serde(alias = "RX1Freq", alias = "Freq")]
    pub freq: u32,
    /// RX1 (or class C immediate) data rate index.
    #[serde(alias = "RX1DR", alias = "DR")]
    pub dr: u8,
    /// Seconds after the triggering uplink that RX1 opens. `0` and `1` are
    /// equivalent (see [`DnFrame::effective_rxdelay`]).
    #[serde(alias = "RxDelay")]
    pub rxdelay: u8,
    /// Hex-encoded target device EUI, e.g. `"00-11-22-33-44-55-66-77"` or
    /// `"0011223344556677"`.
    #[serde(alias = "DevEui", alias = "DevEUI")]
    pub dev_eui: String,
    #[serde(default, alias = "RX2Freq")]
    pub rx2freq: Option<u32>,
    #[serde(default, alias = "RX2DR")]
    pub rx2dr: Option<u8>,
    #[serde(default)]
    pub priority: Option<i16>,
}

impl DnFrame {
    /// `RxDelay` 0 and 1 both mean a 1s RX1 delay, per LoRaWAN convention.
    pub fn effective_rxdelay(&self) -> u8 {
        self.rxdelay.max(1)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnframeLegacy {
    pub dnmsg: DnFrame,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimesyncDown {
    pub txtime: i64,
    #[serde(default)]
    pub gpstime: Option<i64>,
    #[serde(default)]
    pub xtime: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunCmd {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RmtSh {
    pub session: u8,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub term: Option<(u16, u16)>,
}

/// Messages this station sends up to the LNS.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "msgtype")]
pub enum UpMessage {
    #[serde(rename = "version")]
    Version(VersionInfo),
    #[serde(rename = "up")]
    Uplink(UpInfo),
    #[serde(rename = "jreq")]
    JoinRequest(JoinRequestInfo),
    #[serde(rename = "dntxed")]
    Dntxed(DntxedInfo),
    #[serde(rename = "timesync")]
    TimesyncUp(TimesyncUp),
    #[serde(rename = "getxtime")]
    GetXtime(GetXtimeUp),
    #[serde(rename = "event")]
    Event(EventInfo),
    #[serde(rename = "alarm")]
    Alarm(AlarmInfo),
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub station: String,
    pub firmware: String,
    pub package: String,
    pub model: String,
    pub protocol: u32,
    pub features: String,
}

#[derive(Debug, Clone, Serialize)]
#[allow(non_snake_case)]
pub struct UpInfo {
    pub dC: u8,
    pub diid: i64,
    pub data: String,
    pub rctx: i64,
    pub xtime: i64,
    pub gpstime: i64,
    pub rssi: i16,
    pub snr: f32,
    pub dr: u8,
    pub freq: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRequestInfo {
    #[serde(rename = "MHdr")]
    pub mhdr: u8,
    pub join_eui: String,
    pub dev_eui: String,
    pub dev_nonce: u16,
    pub xtime: i64,
    pub rssi: i16,
    pub snr: f32,
    pub dr: u8,
    pub freq: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DntxedInfo {
    pub diid: i64,
    /// Alias of `diid`, carried separately for LNS implementations that
    /// still expect the older `seqno` field name.
    pub seqno: i64,
    pub dev_eui: String,
    pub rctx: i64,
    pub xtime: i64,
    pub txtime: i64,
    pub gpstime: Option<i64>,
    pub dr: u8,
    pub freq: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimesyncUp {
    pub txtime: i64,
    pub gpstime: Option<i64>,
    pub xtime: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetXtimeUp {
    pub txunit: u8,
}

/// `{msgtype: "event", evcat: "gps", evtype: "fix"|"move"|"nofix", ...}`.
/// `evcat` is currently always `"gps"` (the only event category the core
/// itself raises; other categories are reserved for collaborators out of
/// scope here), so it is fixed rather than typed as an open string.
#[derive(Debug, Clone, Serialize)]
pub struct EventInfo {
    pub evcat: &'static str,
    pub evtype: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpstime: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlarmInfo {
    pub msg: String,
    pub severity: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_config_decodes_with_defaults() {
        let raw = r#"{"msgtype":"router_config","region":"EU868"}"#;
        match serde_json::from_str::<DownMessage>(raw).unwrap() {
            DownMessage::RouterConfig(rc) => {
                assert_eq!(rc.region, "EU868");
                assert!(rc.join_eui.is_empty());
                assert!(!rc.nocca);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dnsched_flattens_frame_fields() {
        let raw = r#"{"msgtype":"dnsched","dC":0,"diid":1,"pdu":"ABCD","rctx":0,"RX1Freq":868100000,"RX1DR":0,"RxDelay":1,"DevEui":"00-11-22-33-44-55-66-77","gpstime":123456}"#;
        match serde_json::from_str::<DownMessage>(raw).unwrap() {
            DownMessage::Dnsched(d) => {
                assert_eq!(d.frame.diid, 1);
                assert_eq!(d.gpstime, 123456);
                assert_eq!(d.frame.freq, 868_100_000);
                assert_eq!(d.frame.dev_eui, "00-11-22-33-44-55-66-77");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn up_message_serializes_with_msgtype_tag() {
        let up = UpMessage::Uplink(UpInfo {
            dC: 0,
            diid: 0,
            data: "ABCD".into(),
            rctx: 0,
            xtime: 0,
            gpstime: 0,
            rssi: -80,
            snr: 7.5,
            dr: 5,
            freq: 868_100_000,
        });
        let json = serde_json::to_value(&up).unwrap();
        assert_eq!(json["msgtype"], "up");
        assert_eq!(json["freq"], 868_100_000);
    }
}
