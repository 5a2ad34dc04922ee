//! Station Core Constants
//!
//! Timing, sizing, and protocol constants mirrored from the reference
//! basestation's `s2conf.h`/`s2e.h`/`timesync.h`/`ralsub.h`. Values are kept
//! in host microseconds (`i64`) unless noted, matching `ustime_t` in the
//! original.

/// Maximum number of antennas / TX units (concentrator chips) per station.
pub const MAX_TXUNITS: usize = 4;

/// Maximum number of concentrator chips contributing upstream channels.
pub const MAX_CHIPS: usize = 8;

/// Maximum sparse upstream channel-definition slots (`MAX_CHIPS * 10`).
pub const MAX_UPCHNLS: usize = MAX_CHIPS * 10;

/// Maximum per-channel duty-cycle accounting slots (last one is shared overflow).
pub const MAX_DNCHNLS: usize = 48;

/// Maximum disjoint JoinEUI ranges in the pass-through filter.
pub const MAX_JOINEUI_RANGES: usize = 10;

/// Maximum remote-shell sessions multiplexed over WS binary frames.
pub const MAX_RMTSH: usize = 2;

/// Maximum bytes of a single TX/RX frame body (fits one pipe record).
pub const MAX_TXFRAME_LEN: usize = 255;
pub const MAX_RXFRAME_LEN: usize = 255;

/// Maximum bytes of a hardware-spec string embedded in a CONFIG record.
pub const MAX_HWSPEC_SIZE: usize = 32;

/// POSIX `PIPE_BUF`: the largest write guaranteed atomic on a pipe.
pub const PIPE_BUF: usize = 4096;

/// Capacity of the TX job pool (arena-addressed, see `txrx::txpool`).
pub const MAX_TXJOBS: usize = 64;

/// Capacity in bytes of the shared TX payload arena.
pub const MAX_TXDATA: usize = MAX_TXJOBS * MAX_TXFRAME_LEN;

/// Capacity of the RX job pool.
pub const MAX_RXJOBS: usize = 64;

/// Capacity in bytes of the shared RX payload arena.
pub const MAX_RXDATA: usize = MAX_RXJOBS * MAX_RXFRAME_LEN;

/// Number of supported data rates (LoRaWAN DR0..DR15 slots, some unused per-region).
pub const DR_CNT: usize = 16;
pub const DR_ILLEGAL: u8 = 16;

// ---------------------------------------------------------------------
// TX scheduler timing (s2conf.h CONF_PARAM defaults)
// ---------------------------------------------------------------------

/// Minimum distance between two frames being TXed on the same antenna (µs).
pub const TX_MIN_GAP: i64 = 10_000;

/// Aim for this TX lead time before air; must not fall under `TX_MIN_GAP` (µs).
pub const TX_AIM_GAP: i64 = 60_000;

/// Maximum time a message can be scheduled into the future (µs, ~10 min).
pub const TX_MAX_AHEAD: i64 = 600_000_000;

/// How far into an ongoing TX we check radio status (µs).
pub const TXCHECK_FUDGE: i64 = 5_000;

/// Retry interval for class C TX attempts (µs).
pub const CLASS_C_BACKOFF_BY: i64 = 100_000;

/// Maximum number of class C TX attempts before giving up.
pub const CLASS_C_BACKOFF_MAX: u32 = 10;

/// Class A RX1->RX2 fallback shift (µs, fixed 1s slot).
pub const RX2_FALLBACK_SHIFT: i64 = 1_000_000;

// Priority penalties (s2e.h PRIO_PENALTY_*, PRIO_BEACON)
pub const PRIO_PENALTY_ALTTXTIME: i16 = 10;
pub const PRIO_PENALTY_ALTANTENNA: i16 = 10;
pub const PRIO_PENALTY_CCA: i16 = 8;
pub const PRIO_BEACON: i16 = 128;

// ---------------------------------------------------------------------
// Time-sync engine (timesync.c)
// ---------------------------------------------------------------------

/// One second in microseconds.
pub const PPM: i64 = 1_000_000;

/// Interval between concentrator time-sync radio samples (µs, ~2.1s).
pub const TIMESYNC_RADIO_INTV: i64 = 2_100_000;

/// Retry spacing within an LNS timesync burst (µs, ~71ms).
pub const TIMESYNC_LNS_RETRY: i64 = 71_000;

/// Pause between LNS timesync bursts (µs, ~5s).
pub const TIMESYNC_LNS_PAUSE: i64 = 5_000_000;

/// Number of timesync messages per burst before pausing.
pub const TIMESYNC_LNS_BURST: u32 = 10;

/// Interval between time-sync status reports (µs, ~5 min).
pub const TIMESYNC_REPORTS: i64 = 300_000_000;

/// Maximum age of the last PPS sync still usable for GPS conversions (µs, ~10 min).
pub const PPS_VALID_INTV: i64 = 600_000_000;

/// Number of recent sync qualities kept for the acceptance-threshold quantile.
pub const N_SYNC_QUAL: usize = 30;
/// Quantile (percent) used as the sync-quality cutoff.
pub const SYNC_QUAL_THRES: usize = 90;
/// Floor below which the quality threshold never drops (µs).
pub const SYNC_QUAL_GOOD: i64 = 100;

/// Number of recent drift samples kept per ring (MCU and PPS rings).
pub const N_DRIFTS: usize = 20;
/// Quantile (percent) used as the MCU/concentrator drift-acceptance cutoff.
pub const MCU_DRIFT_THRES: usize = 90;
/// Quantile (percent) used as the PPS drift-acceptance cutoff.
pub const PPS_DRIFT_THRES: usize = 80;
/// Drift samples are kept in deci-ppm (ppm * 10) as integers.
pub const IPPM_SCALE: i64 = 10;
/// Lower bound on the accepted drift threshold, deci-ppm.
pub const MIN_MCU_DRIFT_THRES: i64 = 2 * IPPM_SCALE;
/// Upper bound on the accepted drift threshold, deci-ppm.
pub const MAX_MCU_DRIFT_THRES: i64 = 100 * IPPM_SCALE;
/// Consecutive excessive-drift rejections before a quick warning fires.
pub const QUICK_RETRIES: u32 = 3;

/// Maximum acceptable jitter between two consecutive PPS phase samples (µs).
pub const MAX_PPS_ERROR: i64 = 1000;
/// Initial "no PPS" alarm threshold (seconds).
pub const NO_PPS_ALARM_INI: f64 = 10.0;
/// Growth rate applied to the alarm threshold while PPS stays missing.
pub const NO_PPS_ALARM_RATE: f64 = 2.0;
/// Cap on the "no PPS" alarm threshold (seconds).
pub const NO_PPS_ALARM_MAX: f64 = 3600.0;

/// GPS epoch (1980-01-06 UTC) expressed in seconds since the Unix epoch.
pub const UTC_GPS_EPOCH_S: i64 = 315_964_800;

// ---------------------------------------------------------------------
// xtime / rctx bit layout (ral.h)
// ---------------------------------------------------------------------

pub const RAL_TXUNIT_SHIFT: u32 = 56;
pub const RAL_XTSESS_SHIFT: u32 = 48;
pub const RAL_TXUNIT_MASK: u64 = 0x7F;
pub const RAL_XTSESS_MASK: u64 = 0xFF;
pub const RAL_USTIME_MASK: u64 = (1u64 << 48) - 1;

// ---------------------------------------------------------------------
// Region / beacon
// ---------------------------------------------------------------------

/// Beacon period (GPS-epoch aligned, seconds).
pub const BEACON_INTVL_S: i64 = 128;
/// Lead time before a beacon slot that the beacon task wakes to prepare it (µs).
pub const BEACON_PREP_LEAD: i64 = 800_000;
/// Beacon layout length in bytes (time(4) + crc1(2) + infodesc(1) + lat(3) + lon(3) + crc2(2) = 15,
/// padded to 17 with RFU per the original `s2bcn_t` layout).
pub const BEACON_LEN: usize = 17;
/// Retry interval while beacon state is stuck NOTIME/NOPOS (µs).
pub const BEACON_RETRY_INTV: i64 = 10_000_000;

// ---------------------------------------------------------------------
// Process / exit codes (sys.h)
// ---------------------------------------------------------------------

pub const EXIT_NOP: i32 = 6;
pub const FATAL_GENERIC: i32 = 30;
pub const FATAL_MAX: i32 = 40;

/// Slave watchdog poll interval (ms).
pub const WAIT_SLAVE_PID_INTV_MS: u64 = 500;
/// Restarts allowed without any successful interaction before declaring fatal.
pub const SLAVE_RESTART_VELOCITY_LIMIT: u32 = 4;

/// TC (transport-control) handshake timeout (µs, ~60s).
pub const TC_TIMEOUT: i64 = 60_000_000;

/// Concentrator RX FIFO poll interval in the slave's cooperative loop (ms).
pub const RX_POLL_INTV_MS: u64 = 20;

/// Non-blocking pipe I/O retry count for synchronous master/slave exchanges.
pub const RETRY_PIPE_IO: u32 = 5;
/// Sleep between pipe I/O retries (µs).
pub const RETRY_PIPE_IO_SLEEP: u64 = 500;

// ---------------------------------------------------------------------
// Duty cycle sentinels (s2e.c)
// ---------------------------------------------------------------------

/// A duty-cycle slot pinned to this value is permanently free (DC disabled
/// for it).
pub const USTIME_MIN: i64 = i64::MIN;
/// A duty-cycle slot pinned to this value is permanently blocked.
pub const USTIME_MAX: i64 = i64::MAX;
