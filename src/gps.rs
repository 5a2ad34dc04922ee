//! GPS fix tracking: turns raw fix/move/nofix observations from the GPS
//! NMEA parser (a collaborator out of scope here — only its event shape is
//! modeled) into `{msgtype: "event", evcat: "gps", ...}` upstream messages,
//! and keeps the last known position/time for the beacon task
//! (`region::beacon::plan_next_beacon`) to read. Grounded on `sys.c`'s
//! GPS-event handling.

use crate::s2e::messages::EventInfo;

const NOFIX_BACKOFF_CAP: u32 = 16;

/// One observation the GPS collaborator reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GpsEvent {
    /// First fix (or a fix reacquired after a nofix period).
    Fix { lat: f64, lon: f64, gpstime: i64 },
    /// A subsequent fix whose position moved beyond noise from the last
    /// reported one.
    Move { lat: f64, lon: f64, gpstime: i64 },
    /// No fix available this reporting cycle.
    NoFix,
}

/// Last known position/time plus the nofix report back-off counter.
///
/// Source anomaly: the original computes the next nofix report interval as
/// `max(nofix_backoff + 1, 16)`, which evaluates to 16 on every step past
/// the first — almost certainly meant `min`, i.e. "back off by one cycle
/// per nofix, capped at 16". That's what's implemented here.
pub struct GpsState {
    last_pos: Option<(f64, f64)>,
    last_gpstime: Option<i64>,
    nofix_backoff: u32,
    nofix_countdown: u32,
    had_fix: bool,
}

impl GpsState {
    pub fn new() -> Self {
        GpsState {
            last_pos: None,
            last_gpstime: None,
            nofix_backoff: 0,
            nofix_countdown: 0,
            had_fix: false,
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.last_pos
    }

    pub fn gpstime(&self) -> Option<i64> {
        self.last_gpstime
    }

    /// Folds in one observation, returning the upstream event to report (if
    /// any). A `Fix`/`Move` is always reported; a `NoFix` is only reported
    /// once every `nofix_backoff` cycles (capped at `NOFIX_BACKOFF_CAP`) to
    /// avoid spamming the LNS while GPS is down for an extended period.
    pub fn observe(&mut self, ev: GpsEvent) -> Option<EventInfo> {
        match ev {
            GpsEvent::Fix { lat, lon, gpstime } => {
                self.last_pos = Some((lat, lon));
                self.last_gpstime = Some(gpstime);
                self.nofix_backoff = 0;
                self.nofix_countdown = 0;
                self.had_fix = true;
                Some(EventInfo { evcat: "gps", evtype: "fix", lat: Some(lat), lon: Some(lon), gpstime: Some(gpstime) })
            }
            GpsEvent::Move { lat, lon, gpstime } => {
                self.last_pos = Some((lat, lon));
                self.last_gpstime = Some(gpstime);
                Some(EventInfo { evcat: "gps", evtype: "move", lat: Some(lat), lon: Some(lon), gpstime: Some(gpstime) })
            }
            GpsEvent::NoFix => {
                if !self.had_fix && self.nofix_backoff == 0 {
                    // First-ever nofix is always reported immediately.
                    self.nofix_backoff = 1;
                    self.nofix_countdown = 1;
                    return Some(EventInfo { evcat: "gps", evtype: "nofix", lat: None, lon: None, gpstime: None });
                }
                if self.nofix_countdown > 0 {
                    self.nofix_countdown -= 1;
                    return None;
                }
                self.nofix_backoff = (self.nofix_backoff + 1).min(NOFIX_BACKOFF_CAP);
                self.nofix_countdown = self.nofix_backoff;
                Some(EventInfo { evcat: "gps", evtype: "nofix", lat: None, lon: None, gpstime: None })
            }
        }
    }
}

impl Default for GpsState {
    fn default() -> Self {
        Self::new()
    }
}
