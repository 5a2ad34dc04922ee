//! PPS acquisition / loss tracking: the exponentially back-off "no PPS"
//! alarm. Ported from the `no_pps_thres` handling in `timesync.c`'s
//! `ts_updateTimesync`.

use crate::constants::{NO_PPS_ALARM_INI, NO_PPS_ALARM_MAX, NO_PPS_ALARM_RATE, PPM};

pub struct PpsAlarm {
    threshold_secs: f64,
}

impl PpsAlarm {
    pub fn new() -> Self {
        PpsAlarm {
            threshold_secs: NO_PPS_ALARM_INI,
        }
    }

    /// Given the elapsed time since the last latched PPS pulse (µs), returns
    /// `Some(seconds)` once the alarm threshold is crossed and advances the
    /// threshold (exponential back-off, capped at `NO_PPS_ALARM_MAX`) so
    /// repeated calls don't re-fire every tick.
    pub fn check(&mut self, since_last_pps_us: i64) -> Option<f64> {
        let secs = (since_last_pps_us as f64 + PPM as f64 / 2.0) / PPM as f64;
        if secs <= self.threshold_secs {
            return None;
        }
        let fired = self.threshold_secs;
        self.threshold_secs = if self.threshold_secs >= NO_PPS_ALARM_MAX {
            self.threshold_secs + NO_PPS_ALARM_MAX
        } else {
            self.threshold_secs * NO_PPS_ALARM_RATE
        };
        Some(fired)
    }

    pub fn reset(&mut self) {
        self.threshold_secs = NO_PPS_ALARM_INI;
    }
}

impl Default for PpsAlarm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_past_threshold_then_backs_off() {
        let mut alarm = PpsAlarm::new();
        assert!(alarm.check(5 * 1_000_000).is_none());
        let first = alarm.check(11 * 1_000_000).unwrap();
        assert_eq!(first, NO_PPS_ALARM_INI);
        assert!(alarm.check(11 * 1_000_000).is_none());
    }

    #[test]
    fn threshold_never_exceeds_cap_growth_rule() {
        let mut alarm = PpsAlarm::new();
        for _ in 0..20 {
            alarm.check(100_000 * 1_000_000);
        }
        assert!(alarm.threshold_secs >= NO_PPS_ALARM_MAX);
    }
}
