//! `station` — the LoRaWAN basestation packet-forwarder binary. Normally
//! runs as the master process: one cooperative event loop juggling the LNS
//! WebSocket and every concentrator's slave subprocess. Re-execs itself with
//! `--ral-slave <txunit>` (see `ral::master::Master::spawn_slave`) to become
//! one of those slave processes, matching the original's single-binary
//! fork-and-reexec design rather than shipping a second executable.

use std::path::PathBuf;

use clap::Parser;

use station_core::config::{check_roll_forward, read_cred_uri, CredCat, CredSet, ConfigStore, FsConfigStore};
use station_core::logging::{init_logger, log_error, log_info, log_warn};
use station_core::ral::concentrator::SimConcentrator;
use station_core::ral::slave::{run_cooperative_loop, Slave};
use station_core::transport::ws::WsTransport;
use station_core::{fatal, Station};

#[derive(Parser)]
#[command(name = "station")]
#[command(about = "LoRaWAN basestation packet-forwarder core (S2E engine)")]
struct Cli {
    /// Directory holding station.conf, slave-N.conf, and credential files.
    #[arg(long, default_value = ".")]
    home: PathBuf,

    /// Directory holding station.lastpos and other runtime state.
    #[arg(long, default_value = ".")]
    temp: PathBuf,

    /// Station EUI, as a 16-hex-digit string, used in the LNS router path
    /// and the `version` up message.
    #[arg(long, default_value = "0000000000000000")]
    station_eui: String,

    /// Internal: re-exec's this binary into a RAL slave for the given
    /// concentrator index instead of running the master loop.
    #[arg(long, hide = true)]
    ral_slave: Option<u8>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger();

    if let Some(txunit) = cli.ral_slave {
        run_slave(txunit);
        return;
    }

    if let Err(e) = run_master(cli).await {
        log_error(&format!("station exiting: {e}"));
        std::process::exit(1);
    }
}

/// The slave side: reads command records on stdin, writes reply records on
/// stdout, and polls a concentrator driver in between. Only the software
/// simulation is wired up here; a real driver plugs into the same
/// `Concentrator` trait.
fn run_slave(txunit: u8) {
    log_info(&format!("ral slave {txunit} starting"));
    let mut slave = Slave::new(txunit, SimConcentrator::new(0));
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(e) = run_cooperative_loop(&mut slave, stdin.lock(), stdout.lock(), txunit as i64) {
        log_error(&format!("ral slave {txunit} terminated: {e}"));
        std::process::exit(1);
    }
}

/// The master side: resumes any interrupted credential roll-forward,
/// connects to the LNS, spawns one slave per configured concentrator, and
/// runs the cooperative loop until the transport drops, reconnecting each
/// time per `station.rs`'s `run_once` contract.
async fn run_master(cli: Cli) -> station_core::Result<()> {
    let mut bak_done = [false, false];
    check_roll_forward(&cli.home, &mut bak_done)?;

    let config = FsConfigStore::new(cli.home.clone(), cli.temp.clone());
    let _station_conf = config.read_station_conf().ok();

    let station_eui = u64::from_str_radix(&cli.station_eui, 16).unwrap_or(0);
    let exe_path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("station"));

    loop {
        let uri = match read_cred_uri(&cli.home, CredCat::Tc, CredSet::Reg) {
            Ok(uri) => uri,
            Err(e) => {
                fatal::abort(&format!("no usable tc.uri: {e}"));
            }
        };

        let transport = match WsTransport::connect(&uri).await {
            Ok(t) => t,
            Err(e) => {
                log_warn(&format!("connect to {uri} failed: {e}, retrying"));
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        let mut station = Station::new(exe_path.clone(), station_core::constants::MAX_TXUNITS, Box::new(transport), station_eui);
        if let Err(e) = station.start(&config).await {
            log_warn(&format!("station start failed: {e}, reconnecting"));
            continue;
        }

        loop {
            match station.run_once().await {
                Ok(true) => {}
                Ok(false) => {
                    log_warn("transport disconnected, reconnecting");
                    break;
                }
                Err(e) => {
                    log_warn(&format!("run_once error: {e}, reconnecting"));
                    break;
                }
            }
        }
    }
}
