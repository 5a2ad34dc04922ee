//! Process-wide fatal error handling.
//!
//! Only "core invariants violated" conditions reach here: an unusable
//! hardware spec, an sx130x JSON too large to fit a pipe record, channel
//! allocation failure, or a slave exceeding its restart velocity limit.
//! Everything else is recovered locally by its owning subsystem.

use crate::constants::{FATAL_GENERIC, FATAL_MAX};
use log::error;

/// Aborts the process with a code in `[FATAL_GENERIC, FATAL_MAX]`, logging
/// the reason first. A supervising process (or, for the master, `init`)
/// observes this range and does not attempt to restart the station.
pub fn abort(reason: &str) -> ! {
    error!("FATAL: {reason}");
    std::process::exit(FATAL_GENERIC);
}

/// Aborts with a specific offset into the fatal range, clamped to stay
/// within `[FATAL_GENERIC, FATAL_MAX]`.
pub fn abort_with_code(reason: &str, offset: i32) -> ! {
    error!("FATAL: {reason}");
    let code = (FATAL_GENERIC + offset.max(0)).min(FATAL_MAX);
    std::process::exit(code);
}

/// True if `code` falls in the fatal exit range that a supervisor must
/// treat as "do not restart".
pub fn is_fatal_exit(code: i32) -> bool {
    (FATAL_GENERIC..=FATAL_MAX).contains(&code)
}
