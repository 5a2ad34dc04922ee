//! The station context: owns every subsystem (event loop, time-sync table,
//! TX scheduler, S2E uplink policy, regional policy, RAL master, LNS
//! transport) and is the only place that threads state between them. Ported
//! from `s2e.c`'s `s2ctx_t` plus `tc.c`'s connection-management loop, with
//! the callback-table dispatch replaced by ordinary method calls on this
//! struct (see DESIGN.md "Global mutable state").

use std::path::PathBuf;

use crate::config::{ConfigStore, StationConf};
use crate::constants::{MAX_TXUNITS, PPM, PRIO_BEACON, TC_TIMEOUT};
use crate::error::{Result, StationError};
use crate::eventloop::EventLoop;
use crate::gps::{GpsEvent, GpsState};
use crate::logging::{log_debug, log_info, log_warn};
use crate::ral::{Master, RalCmd, RalRecord};
use crate::region::beacon::{BeaconConfig, BeaconLayout};
use crate::region::{Region, RegionPolicy};
use crate::s2e::filter::{JoinEuiFilter, NetIdFilter};
use crate::s2e::frame::FrameKind;
use crate::s2e::messages::{
    BeaconParams, DnFrame, DownMessage, DntxedInfo, GetXtimeUp, JoinRequestInfo, RouterConfig, TimesyncDown,
    TimesyncUp, UpInfo, UpMessage, VersionInfo,
};
use crate::s2e::rps::Rps;
use crate::s2e::uplink::{build_join_request_info, build_up_info};
use crate::s2e::UplinkPolicy;
use crate::scheduler::Scheduler;
use crate::timesync::{convert, lns, LnsTimesync, TimeSync, TimeSyncTable};
use crate::transport::{Transport, TransportMessage};
use crate::txrx::{RxPool, TxFlags, TxJob};

/// Station protocol/package identity reported in the `version` message,
/// read from the crate's own version the same way the CLI's `--version`
/// output does.
const STATION_PKG: &str = env!("CARGO_PKG_VERSION");

/// Everything one running station needs, minus the concrete transport and
/// RAL slave binary path (supplied at construction so tests can substitute
/// both).
pub struct Station {
    event_loop: EventLoop,
    timesync: TimeSyncTable,
    scheduler: Scheduler,
    uplink_policy: UplinkPolicy,
    region_policy: Box<dyn RegionPolicy>,
    rx_pool: RxPool,
    master: Master,
    transport: Box<dyn Transport>,
    lns_timesync: LnsTimesync,
    station_eui: u64,
    next_diid: i64,
    tc_last_recv_ustime: i64,
    gps: GpsState,
    beacon: Option<BeaconConfig>,
    next_beacon_check: i64,
}

impl Station {
    pub fn new(exe_path: impl Into<PathBuf>, txunits: usize, transport: Box<dyn Transport>, station_eui: u64) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Station {
            event_loop: EventLoop::new(now),
            timesync: TimeSyncTable::new(),
            scheduler: Scheduler::new(0),
            uplink_policy: UplinkPolicy::new(Region::Unknown),
            region_policy: Region::Unknown.policy(),
            rx_pool: RxPool::new(),
            master: Master::new(exe_path, txunits),
            transport,
            lns_timesync: LnsTimesync::new(),
            station_eui,
            next_diid: 1,
            tc_last_recv_ustime: now,
            gps: GpsState::new(),
            beacon: None,
            next_beacon_check: now,
        }
    }

    pub fn now(&self) -> i64 {
        self.event_loop.now_ustime()
    }

    fn version_message() -> UpMessage {
        UpMessage::Version(VersionInfo {
            station: STATION_PKG.to_string(),
            firmware: STATION_PKG.to_string(),
            package: STATION_PKG.to_string(),
            model: "station-core".to_string(),
            protocol: 2,
            features: "rmtsh".to_string(),
        })
    }

    /// Spawns one slave per configured concentrator and sends the initial
    /// `version` message, matching the original's connect-time handshake
    /// order (version announced before any `router_config` is known).
    pub async fn start(&mut self, config: &impl ConfigStore) -> Result<()> {
        let paths = config.slave_conf_paths()?;
        for (txunit, _path) in paths.iter().enumerate().take(MAX_TXUNITS) {
            self.master.spawn_slave(txunit as u8)?;
        }
        self.send_up(Self::version_message()).await
    }

    async fn send_up(&mut self, msg: UpMessage) -> Result<()> {
        let json = serde_json::to_string(&msg)?;
        match self.transport.send_text(json).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log_warn(&format!("dropping outgoing {msg:?}, transport error: {e}"));
                Err(StationError::SendBufferFull { kind: "up" })
            }
        }
    }

    /// Applies a freshly-received `router_config`: resets the region policy,
    /// the uplink JoinEUI/NetID filters, and the scheduler's DR table.
    /// Pushes a `Config` record to every running slave, passing the raw
    /// `sx1301_conf`/`sx1302_conf` JSON through verbatim (the concentrator
    /// model's channel-plan interpretation is the slave/driver's concern,
    /// not the core's).
    pub fn apply_router_config(&mut self, rc: &RouterConfig) -> Result<()> {
        let region = Region::parse(&rc.region);
        self.region_policy = region.policy();
        self.scheduler.configure_region(self.region_policy.as_ref(), rc.nodc);
        self.scheduler.set_dr_table(match region {
            Region::Us915 | Region::Au915 => crate::region::dr::DrTable::us915(),
            _ => crate::region::dr::DrTable::eu868(),
        });

        let netid_bits = if rc.netid.is_empty() {
            u128::MAX
        } else {
            rc.netid.iter().filter(|&&id| id < 128).fold(0u128, |acc, &id| acc | (1u128 << id))
        };
        self.uplink_policy = UplinkPolicy {
            region,
            join_eui_filter: JoinEuiFilter::new(rc.join_eui.clone()),
            netid_filter: NetIdFilter::new(netid_bits),
        };

        let json = serde_json::to_vec(&rc.sx1301_conf).unwrap_or_default();
        for txunit in 0..MAX_TXUNITS as u8 {
            let _ = self.master.send(
                txunit,
                &RalRecord::ConfigReq {
                    rctx: txunit as i64,
                    region: region as u32 as u32,
                    upchs: Vec::new(),
                    hwspec: [0u8; crate::constants::MAX_HWSPEC_SIZE],
                    json: json.clone(),
                },
            );
        }
        match &rc.beacon {
            Some(bp) => {
                self.beacon = Some(BeaconConfig::new(bp.dr, bp.freqs.clone(), BeaconLayout::EU868));
                self.next_beacon_check = self.now();
                log_info("router_config enables beaconing");
            }
            None => self.beacon = None,
        }

        log_info(&format!("applied router_config for region {:?}", region));
        Ok(())
    }

    /// Folds in one GPS observation, returning the upstream event (if any)
    /// to report. Position/time are latched for [`Self::maybe_schedule_beacon`]
    /// to read.
    pub async fn report_gps(&mut self, ev: GpsEvent) -> Result<()> {
        if let Some(info) = self.gps.observe(ev) {
            self.send_up(UpMessage::Event(info)).await?;
        }
        Ok(())
    }

    /// Checks whether it's time to plan and admit the next Class B beacon,
    /// a no-op if beaconing isn't configured or isn't due yet. Mirrors
    /// `s2e_bcntimeout`'s poll cadence: each call either schedules the next
    /// beacon and reports when the following check is due, or (if GPS time
    /// or position isn't available) backs off to `BEACON_RETRY_INTV`.
    fn maybe_schedule_beacon(&mut self) -> Result<()> {
        let Some(mut cfg) = self.beacon.take() else { return Ok(()) };
        let now = self.now();
        if now < self.next_beacon_check {
            self.beacon = Some(cfg);
            return Ok(());
        }

        let (plan, next_wakeup) = crate::region::beacon::plan_next_beacon(&mut cfg, self.gps.gpstime(), self.gps.position());
        self.next_beacon_check = now + next_wakeup;

        if let Some(next) = plan {
            const BEACON_TXUNIT: u8 = 0;
            if let Some(xtime) = convert::gpstime2xtime(&self.timesync, BEACON_TXUNIT, next.gpstime) {
                if let Some(txtime) = convert::xtime2ustime(&self.timesync, xtime) {
                    let mut job = TxJob::new(0, 0, txtime);
                    job.xtime = xtime;
                    job.gpstime = Some(next.gpstime);
                    job.txunit = BEACON_TXUNIT;
                    job.freq = next.freq;
                    job.dr = next.dr;
                    job.prio = PRIO_BEACON;
                    job.len = next.pdu.len() as u8;
                    job.flags |= TxFlags::BCN;
                    match self.scheduler.add_txjob(job, self.region_policy.as_ref(), now) {
                        Ok(idx) => self.scheduler.pool_mut().reserve_data(idx, &next.pdu)?,
                        Err(e) => log_warn(&format!("beacon not admitted: {e}")),
                    }
                } else {
                    log_warn("beacon planned but xtime2ustime failed, skipping this slot");
                }
            } else {
                log_warn("beacon planned but gpstime2xtime failed, skipping this slot");
            }
        }

        self.beacon = Some(cfg);
        Ok(())
    }

    /// Dispatches one decoded downlink message from the LNS. `runcmd`/`rmtsh`
    /// are narrow collaborator event shapes per the crate's scope: they are
    /// logged and otherwise not acted on here.
    pub async fn handle_down(&mut self, msg: DownMessage) -> Result<()> {
        match msg {
            DownMessage::RouterConfig(rc) => self.apply_router_config(&rc),
            DownMessage::Dnmsg(dnmsg) => self.schedule_downlink(dnmsg.0, None),
            DownMessage::Dnsched(sched) => self.schedule_downlink(sched.frame, Some(sched.gpstime)),
            DownMessage::DnframeLegacy(legacy) => self.schedule_downlink(legacy.dnmsg, None),
            DownMessage::Timesync(ts) => self.handle_timesync_down(ts),
            DownMessage::RunCmd(cmd) => {
                log_info(&format!("runcmd requested: {} {:?} (out of scope, not executed)", cmd.command, cmd.args));
                Ok(())
            }
            DownMessage::RmtSh(sh) => {
                log_debug(&format!("rmtsh frame for session {} ({} bytes, out of scope)", sh.session, sh.data.map(|d| d.len()).unwrap_or(0)));
                Ok(())
            }
        }
    }

    fn handle_timesync_down(&mut self, ts: TimesyncDown) -> Result<()> {
        match (ts.xtime, ts.gpstime) {
            (Some(xtime), Some(gpstime)) => {
                lns::set_timesync_lns(&mut self.timesync, xtime, gpstime);
            }
            (_, Some(gpstime)) => {
                lns::process_timesync_lns(&mut self.timesync, ts.txtime, self.now(), gpstime);
            }
            _ => {}
        }
        Ok(())
    }

    /// Decodes `frame.pdu` from hex and admits a [`TxJob`] into the
    /// scheduler. `gpstime`, if given (a `dnsched` message), is resolved to
    /// an `xtime`/`txtime` via the time-sync engine before admission; if
    /// the resolution fails (no PPS lock yet) the job is dropped rather than
    /// guessed at, matching the "drop and log" bucket in the error taxonomy.
    fn schedule_downlink(&mut self, frame: DnFrame, gpstime: Option<i64>) -> Result<()> {
        let payload = hex_decode(&frame.pdu).map_err(|_| StationError::ProtocolViolation {
            msgtype: "dnmsg".into(),
            reason: format!("pdu is not valid hex: {}", frame.pdu),
        })?;
        if payload.len() > u8::MAX as usize {
            return Err(StationError::TxDataExhausted { need: payload.len(), available: u8::MAX as usize });
        }
        let deveui = parse_eui_hex(&frame.dev_eui).ok_or_else(|| StationError::ProtocolViolation {
            msgtype: "dnmsg".into(),
            reason: format!("DevEui is not valid hex: {}", frame.dev_eui),
        })?;

        let class_flag = match frame.dC {
            2 => TxFlags::CLSC,
            _ => TxFlags::CLSA,
        };
        let rxdelay = frame.effective_rxdelay();
        let txunit = convert::xtime2txunit(frame.xtime);
        let txtime = match gpstime {
            Some(gps) => match convert::gpstime2xtime(&self.timesync, txunit, gps).and_then(|xt| convert::xtime2ustime(&self.timesync, xt)) {
                Some(t) => t,
                None => {
                    log_warn(&format!("dropping dnsched diid={}: gpstime not yet resolvable", frame.diid));
                    return Ok(());
                }
            },
            // `xtime` marks the triggering uplink; RX1 (or the class C
            // window) opens `rxdelay` seconds later.
            None => convert::xtime2ustime(&self.timesync, frame.xtime).unwrap_or(self.now()) + rxdelay as i64 * PPM,
        };

        let mut job = TxJob::new(deveui, frame.diid, txtime);
        job.rctx = frame.rctx;
        job.xtime = frame.xtime;
        job.len = payload.len() as u8;
        job.txunit = txunit;
        job.freq = frame.freq;
        job.dr = frame.dr;
        job.rxdelay = rxdelay;
        job.flags |= class_flag;
        if let Some(f) = frame.rx2freq {
            job.rx2freq = f;
        }
        if let Some(dr) = frame.rx2dr {
            job.rx2dr = dr;
        }
        if let Some(prio) = frame.priority {
            job.prio = prio;
        }

        let now = self.now();
        let idx = self.scheduler.add_txjob(job, self.region_policy.as_ref(), now)?;
        self.scheduler.pool_mut().reserve_data(idx, &payload)?;
        Ok(())
    }

    /// Pops every antenna's due job and dispatches it to its slave as a
    /// `Tx`/`TxNocca` record, matching `s2e_nextTxAction`'s per-antenna
    /// polling. Does not wait for the slave's reply; [`Self::poll_master`]
    /// handles that asynchronously.
    pub fn dispatch_due_tx(&mut self) -> Result<()> {
        let now = self.now();
        for ant in 0..MAX_TXUNITS as u8 {
            while let Some(idx) = self.scheduler.next_tx_action(ant, now) {
                let Some(job) = self.scheduler.pool().get(idx) else { continue };
                let rps = self.scheduler.rps_for_dr(job.dr);
                let txdata = self.scheduler.pool().payload(idx).to_vec();
                let rec = RalRecord::TxReq {
                    rctx: job.rctx,
                    nocca: false,
                    txpow: self.region_policy.default_txpow(job.freq),
                    rps: rps.0,
                    addcrc: true,
                    freq: job.freq,
                    xtime: job.xtime,
                    txdata,
                };
                self.master.send(ant, &rec)?;
            }
        }
        Ok(())
    }

    /// Reaps dead slaves, restarts them subject to the velocity limit, and
    /// processes every pending reply on every slave's pipe.
    pub async fn poll_master(&mut self) -> Result<()> {
        let now = self.now();
        for (txunit, code) in self.master.reap() {
            self.master.handle_slave_exit(txunit, code, now)?;
        }
        for txunit in 0..MAX_TXUNITS as u8 {
            let replies = match self.master.poll_replies(txunit) {
                Ok(r) => r,
                Err(StationError::WireDecodeError(_)) => continue, // no slave running yet
                Err(e) => return Err(e),
            };
            for rec in replies {
                self.on_ral_reply(txunit, rec).await?;
            }
        }
        Ok(())
    }

    async fn on_ral_reply(&mut self, txunit: u8, rec: RalRecord) -> Result<()> {
        match rec {
            RalRecord::Response { rctx, cmd, status } => {
                self.master.note_successful_exchange(txunit);
                if matches!(cmd, RalCmd::Tx | RalCmd::TxNocca) {
                    self.on_tx_response(txunit, rctx, status).await?;
                }
                Ok(())
            }
            RalRecord::RxResp { rctx, rps, freq, xtime, rssi, snr, rxdata } => {
                self.master.note_successful_exchange(txunit);
                self.on_uplink(txunit, rctx, Rps(rps), freq, xtime, rssi, snr, rxdata).await
            }
            RalRecord::TimesyncResp { rctx: _, quality, ustime, xtime, pps_xtime } => {
                self.master.note_successful_exchange(txunit);
                let outcome = self.timesync.update_timesync(txunit, quality, TimeSync { ustime, xtime, pps_xtime });
                if outcome.start_lns && !self.lns_timesync.is_active() {
                    self.lns_timesync.start();
                    self.send_up(UpMessage::GetXtime(GetXtimeUp { txunit })).await?;
                }
                if let Some(secs) = outcome.no_pps_secs {
                    log_warn(&format!("txunit {txunit} has seen no PPS pulse for {secs}s"));
                }
                Ok(())
            }
            other => Err(StationError::ProtocolViolation {
                msgtype: "ral".into(),
                reason: format!("master received a request-shaped record as a reply: {other:?}"),
            }),
        }
    }

    /// Handles the slave's reply to a `TxReq`/`TxNocca` record: confirms the
    /// job (advancing duty-cycle bookkeeping and freeing its slot) on
    /// success, drops it uncredited on failure, and reports `dntxed` for any
    /// job that carries a `DevEui` (matching `s2e.c:send_dntxed`'s
    /// `txjob->deveui` gate; beacons and other EUI-less jobs aren't
    /// reported). `rctx` must match the antenna's currently-`TXING` head job;
    /// anything else is a stale or mismatched reply and is logged and
    /// ignored rather than acted on.
    async fn on_tx_response(&mut self, txunit: u8, rctx: i64, status: u8) -> Result<()> {
        let idx = self.scheduler.pool().head(txunit);
        let Some(job) = self.scheduler.pool().get(idx) else {
            log_warn(&format!("tx response for txunit {txunit} rctx {rctx} but no job is queued there"));
            return Ok(());
        };
        if job.rctx != rctx || !job.flags.contains(TxFlags::TXING) {
            log_warn(&format!("tx response rctx {rctx} does not match txunit {txunit}'s head job, dropping"));
            return Ok(());
        }

        let (diid, deveui, xtime, txtime, dr, freq) = (job.diid, job.deveui, job.xtime, job.txtime, job.dr, job.freq);
        let gpstime = convert::xtime2gpstime(&self.timesync, xtime);
        let ok = status != 0;

        if ok {
            self.scheduler.confirm_tx(txunit, idx);
        } else {
            self.scheduler.pool_mut().unlink(txunit, idx);
            self.scheduler.pool_mut().free(idx);
        }

        if deveui != 0 {
            let error = if ok { None } else { Some("radio denied transmission".to_string()) };
            self.send_up(UpMessage::Dntxed(DntxedInfo {
                diid,
                seqno: diid,
                dev_eui: format!("{deveui:016X}"),
                rctx,
                xtime,
                txtime,
                gpstime,
                dr,
                freq,
                error,
            }))
            .await?;
        }
        Ok(())
    }

    async fn on_uplink(&mut self, txunit: u8, rctx: i64, rps: Rps, freq: u32, xtime: i64, rssi: u8, snr: i8, payload: Vec<u8>) -> Result<()> {
        let dr = rps.spreading_factor().map(|sf| 12 - sf).unwrap_or(0);
        self.rx_pool.push(&payload, xtime, -(rssi as i16), snr, dr, freq)?;
        let Some((job, payload)) = self.rx_pool.pop() else { return Ok(()) };

        let kind = match self.uplink_policy.accept(&payload) {
            Ok(Some(kind)) => kind,
            Ok(None) => return Ok(()), // filtered
            Err(e) => {
                log_debug(&format!("dropping unparseable uplink from txunit {txunit}: {e}"));
                return Ok(());
            }
        };

        let gpstime = convert::xtime2gpstime(&self.timesync, xtime).unwrap_or(0);
        let diid = self.next_diid;
        self.next_diid += 1;

        if let Some(jreq) = build_join_request_info(&job, &kind) {
            self.send_up(UpMessage::JoinRequest(jreq)).await
        } else if matches!(kind, FrameKind::Proprietary) {
            Ok(())
        } else {
            let info = build_up_info(&job, &payload, diid, rctx, gpstime);
            self.send_up(UpMessage::Uplink(info)).await
        }
    }

    /// Runs one iteration of the cooperative loop: races the next armed
    /// timer against the next transport message, dispatching whichever
    /// fires first, then always drains due TX and pending RAL replies. A
    /// `TC_TIMEOUT`-long silence from the transport is treated as a dead
    /// connection (the caller should reconnect).
    pub async fn run_once(&mut self) -> Result<bool> {
        tokio::select! {
            msg = self.transport.recv() => {
                match msg? {
                    Some(TransportMessage::Text(text)) => {
                        self.tc_last_recv_ustime = self.now();
                        match serde_json::from_str::<DownMessage>(&text) {
                            Ok(down) => self.handle_down(down).await?,
                            Err(e) => log_warn(&format!("dropping malformed down message: {e}")),
                        }
                    }
                    Some(TransportMessage::Binary(_)) => {
                        self.tc_last_recv_ustime = self.now();
                        log_debug("ignoring binary rmtsh frame (out of scope)");
                    }
                    None => return Ok(false),
                }
            }
            _ = self.event_loop.sleep_until_next_timer(), if self.event_loop.timers_armed() => {}
        }

        if self.now() - self.tc_last_recv_ustime > TC_TIMEOUT {
            log_warn("no message from LNS within TC_TIMEOUT, reconnect required");
            return Ok(false);
        }

        self.maybe_schedule_beacon()?;
        self.dispatch_due_tx()?;
        self.poll_master().await?;
        Ok(true)
    }
}

fn hex_decode(s: &str) -> std::result::Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

/// Parses a device EUI from hex, tolerating `-`/`:` byte separators (e.g.
/// `"00-11-22-33-44-55-66-77"`) as well as the bare 16-hex-digit form.
fn parse_eui_hex(s: &str) -> Option<u64> {
    let cleaned: String = s.chars().filter(|c| *c != '-' && *c != ':').collect();
    u64::from_str_radix(&cleaned, 16).ok()
}

#[cfg(all(test, feature = "sim-concentrator"))]
mod tests {
    use super::*;
    use crate::transport::ws::MockTransport;

    fn station() -> Station {
        Station::new("/usr/bin/station", 1, Box::new(MockTransport::new()), 0x0102030405060708)
    }

    #[test]
    fn hex_decode_round_trips_uplink_encode() {
        assert_eq!(hex_decode("DEAD").unwrap(), vec![0xDE, 0xAD]);
        assert!(hex_decode("ABC").is_err());
    }

    #[test]
    fn apply_router_config_sets_region_and_filters() {
        let mut st = station();
        st.apply_router_config(&RouterConfig {
            region: "US915".into(),
            join_eui: vec![],
            netid: vec![3],
            freq_range: None,
            drs: vec![],
            sx1301_conf: vec![],
            nocca: false,
            nodc: false,
            nodwell: false,
            beacon: None,
        })
        .unwrap();
        assert_eq!(st.uplink_policy.region, Region::Us915);
        assert!(st.uplink_policy.netid_filter.passes(3));
        assert!(!st.uplink_policy.netid_filter.passes(4));
    }

    fn dnframe(pdu: &str) -> DnFrame {
        DnFrame {
            dC: 0,
            diid: 1,
            pdu: pdu.into(),
            rctx: 0,
            xtime: 0,
            freq: 868_100_000,
            dr: 0,
            rxdelay: 1,
            dev_eui: "00-11-22-33-44-55-66-77".into(),
            rx2freq: None,
            rx2dr: None,
            priority: None,
        }
    }

    #[tokio::test]
    async fn schedule_downlink_admits_a_valid_frame() {
        let mut st = station();
        st.schedule_downlink(dnframe("DEAD"), None).unwrap();
        assert_eq!(st.scheduler.pool().used(), 1);
        let idx = st.scheduler.pool().head(0);
        let job = st.scheduler.pool().get(idx).unwrap();
        assert_eq!(job.freq, 868_100_000);
        assert_eq!(job.deveui, 0x0011223344556677);
    }

    #[tokio::test]
    async fn malformed_pdu_hex_is_rejected() {
        let mut st = station();
        let err = st.schedule_downlink(dnframe("ZZ"), None).unwrap_err();
        assert!(matches!(err, StationError::ProtocolViolation { .. }));
    }

    #[tokio::test]
    async fn malformed_dev_eui_is_rejected() {
        let mut st = station();
        let mut frame = dnframe("DEAD");
        frame.dev_eui = "not-hex".into();
        let err = st.schedule_downlink(frame, None).unwrap_err();
        assert!(matches!(err, StationError::ProtocolViolation { .. }));
    }

    #[tokio::test]
    async fn schedule_downlink_advances_txtime_by_rxdelay() {
        let mut st = station();
        let now = st.now();
        st.timesync.set_unit(0, TimeSync { ustime: now, xtime: now, pps_xtime: 0 });
        let mut frame = dnframe("DEAD");
        frame.rxdelay = 3;
        frame.xtime = now;
        st.schedule_downlink(frame, None).unwrap();
        let idx = st.scheduler.pool().head(0);
        let job = st.scheduler.pool().get(idx).unwrap();
        assert_eq!(job.txtime, now + 3_000_000);
    }

    #[tokio::test]
    async fn gps_fix_is_reported_as_an_up_event() {
        let mut st = station();
        st.report_gps(GpsEvent::Fix { lat: 48.2, lon: 16.37, gpstime: 1_000 }).await.unwrap();
        assert_eq!(st.gps.position(), Some((48.2, 16.37)));
    }

    #[tokio::test]
    async fn router_config_beacon_schedules_a_tx_job_once_pps_is_locked() {
        let mut st = station();
        st.apply_router_config(&RouterConfig {
            region: "EU868".into(),
            join_eui: vec![],
            netid: vec![],
            freq_range: None,
            drs: vec![],
            sx1301_conf: vec![],
            nocca: false,
            nodc: false,
            nodwell: false,
            beacon: Some(BeaconParams { dr: 3, freqs: vec![869_525_000] }),
        })
        .unwrap();
        assert!(st.beacon.is_some());

        let now = st.now();
        st.timesync.set_unit(0, TimeSync { ustime: now, xtime: now, pps_xtime: now });
        st.timesync.set_pps_sync(TimeSync { ustime: now, xtime: now, pps_xtime: now });
        st.timesync.set_gps_offset(0);
        st.report_gps(GpsEvent::Fix { lat: 48.2, lon: 16.37, gpstime: now }).await.unwrap();

        st.maybe_schedule_beacon().unwrap();
        assert_eq!(st.scheduler.pool().used(), 1);
    }

    #[test]
    fn beacon_without_gps_lock_does_not_panic_or_schedule() {
        let mut st = station();
        st.apply_router_config(&RouterConfig {
            region: "EU868".into(),
            join_eui: vec![],
            netid: vec![],
            freq_range: None,
            drs: vec![],
            sx1301_conf: vec![],
            nocca: false,
            nodc: false,
            nodwell: false,
            beacon: Some(BeaconParams { dr: 3, freqs: vec![869_525_000] }),
        })
        .unwrap();
        st.maybe_schedule_beacon().unwrap();
        assert_eq!(st.scheduler.pool().used(), 0);
    }
}
