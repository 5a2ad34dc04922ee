//! The RAL slave: one per concentrator chip, running as its own OS process
//! (spawned by `ral::master`). Owns the `Concentrator` driver and translates
//! wire records arriving on its stdin-like command pipe into driver calls,
//! writing `Rx`/`Response`/`Timesync` records back on its stdout-like reply
//! pipe. Ported from `ralsub.c`'s slave main loop.

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::constants::{RETRY_PIPE_IO, RETRY_PIPE_IO_SLEEP, RX_POLL_INTV_MS};
use crate::error::{Result, StationError};
use crate::logging::{log_debug, log_warn};
use crate::ral::concentrator::Concentrator;
use crate::ral::wire::RalRecord;
use crate::s2e::rps::Rps;

/// Per-slave state: the concentrator driver plus the handful of fields a
/// `Config`/`Tx`/`Timesync` record needs tracked between calls.
pub struct Slave<C: Concentrator> {
    pub txunit: u8,
    concentrator: C,
    configured: bool,
}

impl<C: Concentrator> Slave<C> {
    pub fn new(txunit: u8, concentrator: C) -> Self {
        Slave { txunit, concentrator, configured: false }
    }

    /// Handles one request record from the master, returning the response to
    /// write back (every request gets exactly one response, per `ralsub.h`).
    pub fn handle_request(&mut self, req: RalRecord) -> Result<RalRecord> {
        match req {
            RalRecord::ConfigReq { rctx, region, upchs, .. } => {
                let chans: Vec<(u32, Rps)> = upchs.iter().map(|c| (c.freq, Rps(c.rps))).collect();
                let ok = self.concentrator.configure(region, &chans).is_ok();
                self.configured = ok;
                Ok(RalRecord::Response {
                    rctx,
                    cmd: crate::ral::wire::RalCmd::Config,
                    status: ok as u8,
                })
            }
            RalRecord::TxAbortReq { rctx } => {
                self.concentrator.tx_abort()?;
                Ok(RalRecord::Response {
                    rctx,
                    cmd: crate::ral::wire::RalCmd::TxAbort,
                    status: 1,
                })
            }
            RalRecord::TxReq { rctx, nocca, txpow, rps, addcrc, freq, xtime, txdata } => {
                let sent = self.concentrator.transmit(Rps(rps), freq, xtime, txpow, addcrc, &txdata, !nocca)?;
                Ok(RalRecord::Response {
                    rctx,
                    cmd: if nocca { crate::ral::wire::RalCmd::TxNocca } else { crate::ral::wire::RalCmd::Tx },
                    status: sent as u8,
                })
            }
            RalRecord::TimesyncReq { rctx } => {
                let (xtick, pps) = self.concentrator.read_tick()?;
                Ok(RalRecord::TimesyncResp {
                    rctx,
                    quality: if pps { 1 } else { 0 },
                    ustime: now_ustime(),
                    xtime: xtick,
                    pps_xtime: if pps { xtick } else { 0 },
                })
            }
            RalRecord::StopReq { rctx } => Ok(RalRecord::Response {
                rctx,
                cmd: crate::ral::wire::RalCmd::Stop,
                status: 1,
            }),
            other => Err(StationError::ProtocolViolation {
                msgtype: "ral".into(),
                reason: format!("slave received a response-shaped record as a request: {other:?}"),
            }),
        }
    }

    /// Polls the concentrator's RX FIFO once; returns an `Rx` record to send
    /// upstream if a frame was waiting.
    pub fn poll_uplink(&mut self, rctx: i64) -> Result<Option<RalRecord>> {
        Ok(self.concentrator.poll_rx()?.map(|frame| RalRecord::RxResp {
            rctx,
            rps: frame.rps.0,
            freq: frame.freq,
            xtime: frame.xtime,
            rssi: frame.rssi,
            snr: frame.snr,
            rxdata: frame.data,
        }))
    }
}

/// Placeholder for the slave process's own host-clock read; in the real
/// subprocess this is `clock_gettime(CLOCK_MONOTONIC)`-derived, matching the
/// master's `EventLoop` clock source so `ustime` stays comparable across the
/// pipe boundary.
fn now_ustime() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_micros() as i64).unwrap_or(0)
}

/// Runs the slave's cooperative loop until a `Stop` request arrives or
/// `cmd_in` reaches EOF. Each iteration does one non-blocking read into a
/// reassembly buffer, decodes as many complete length-prefixed frames as are
/// available, dispatches and replies to each, then polls the concentrator's
/// RX FIFO and forwards any frame found, sleeping [`RX_POLL_INTV_MS`]
/// between idle iterations.
pub fn run_cooperative_loop<C, R, W>(slave: &mut Slave<C>, mut cmd_in: R, mut reply_out: W, rctx: i64) -> Result<()>
where
    C: Concentrator,
    R: Read,
    W: Write,
{
    let mut reassembly = Vec::new();
    let mut scratch = [0u8; 4096];
    loop {
        match cmd_in.read(&mut scratch) {
            Ok(0) => {
                log_debug("ral slave command pipe reached EOF, exiting cooperative loop");
                return Ok(());
            }
            Ok(n) => reassembly.extend_from_slice(&scratch[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                log_warn(&format!("ral slave command pipe errored: {e}"));
                return Ok(());
            }
        }

        let mut consumed_total = 0;
        loop {
            match RalRecord::decode_framed(&reassembly[consumed_total..], false)? {
                Some((req, consumed)) => {
                    consumed_total += consumed;
                    let is_stop = matches!(req, RalRecord::StopReq { .. });
                    let resp = slave.handle_request(req)?;
                    write_all_retrying(&mut reply_out, &resp.encode_framed()?)?;
                    if is_stop {
                        log_debug("ral slave received Stop, exiting cooperative loop");
                        return Ok(());
                    }
                }
                None => break,
            }
        }
        reassembly.drain(0..consumed_total);

        if let Some(rx) = slave.poll_uplink(rctx)? {
            write_all_retrying(&mut reply_out, &rx.encode_framed()?)?;
        }

        std::thread::sleep(Duration::from_millis(RX_POLL_INTV_MS));
    }
}

fn write_all_retrying<W: Write>(w: &mut W, buf: &[u8]) -> Result<()> {
    let mut retries = 0;
    let mut written = 0;
    while written < buf.len() {
        match w.write(&buf[written..]) {
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                retries += 1;
                if retries > RETRY_PIPE_IO {
                    return Err(StationError::PipeIo { txunit: 0, source: e });
                }
                std::thread::sleep(Duration::from_micros(RETRY_PIPE_IO_SLEEP));
            }
            Err(e) => return Err(StationError::PipeIo { txunit: 0, source: e }),
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "sim-concentrator"))]
mod tests {
    use super::*;
    use crate::ral::concentrator::SimConcentrator;
    use crate::ral::wire::RalCmd;

    #[test]
    fn config_request_reports_ok() {
        let mut slave = Slave::new(0, SimConcentrator::new(0));
        let resp = slave
            .handle_request(RalRecord::ConfigReq {
                rctx: 0,
                region: 1,
                upchs: vec![],
                hwspec: [0u8; crate::constants::MAX_HWSPEC_SIZE],
                json: vec![],
            })
            .unwrap();
        match resp {
            RalRecord::Response { cmd, status, .. } => {
                assert_eq!(cmd, RalCmd::Config);
                assert_eq!(status, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timesync_request_reads_tick() {
        let mut slave = Slave::new(0, SimConcentrator::new(500));
        let resp = slave.handle_request(RalRecord::TimesyncReq { rctx: 9 }).unwrap();
        match resp {
            RalRecord::TimesyncResp { rctx, xtime, .. } => {
                assert_eq!(rctx, 9);
                assert_eq!(xtime, 501);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn poll_uplink_forwards_injected_frame() {
        use crate::ral::concentrator::ConcentratorRxFrame;
        let mut sim = SimConcentrator::new(0);
        sim.inject_rx(ConcentratorRxFrame {
            rps: Rps(5),
            freq: 868_100_000,
            xtime: 10,
            rssi: 80,
            snr: 20,
            data: vec![1, 2, 3],
        });
        let mut slave = Slave::new(0, sim);
        let rx = slave.poll_uplink(0).unwrap().unwrap();
        assert!(matches!(rx, RalRecord::RxResp { .. }));
    }
}
