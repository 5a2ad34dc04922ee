//! The cooperative event loop.
//!
//! The original runs a single-threaded `aio_loop()` (`rt.c`) that blocks in
//! `poll()` until either a registered fd is ready or the next armed timer's
//! deadline passes, then dispatches synchronously. Here that shape becomes
//! a `tokio` current-thread runtime: `EventLoop::sleep_until_next_timer`
//! gives callers a future to race inside `tokio::select!` alongside reads
//! from pipes/sockets (themselves ordinary `tokio::io`/`AsyncFd` futures —
//! there's no separate hand-rolled readiness table to keep in sync, since
//! tokio's reactor already is one).

pub mod timer;

use std::time::{Duration, Instant as StdInstant};
use tokio::time::{sleep_until, Instant as TokioInstant};

pub use timer::{TimerId, TimerWheel};

/// Maps the station's logical microsecond clock (`ustime`, monotonic since
/// an arbitrary epoch) onto `tokio::time::Instant` so timers can be awaited
/// without the event loop polling in a busy loop.
pub struct EventLoop {
    timers: TimerWheel,
    epoch_ustime: i64,
    epoch_instant: StdInstant,
}

impl EventLoop {
    pub fn new(now_ustime: i64) -> Self {
        EventLoop {
            timers: TimerWheel::new(),
            epoch_ustime: now_ustime,
            epoch_instant: StdInstant::now(),
        }
    }

    pub fn now_ustime(&self) -> i64 {
        self.epoch_ustime + self.epoch_instant.elapsed().as_micros() as i64
    }

    fn to_tokio_instant(&self, ustime: i64) -> TokioInstant {
        let delta_us = ustime - self.now_ustime();
        if delta_us <= 0 {
            TokioInstant::now()
        } else {
            TokioInstant::now() + Duration::from_micros(delta_us as u64)
        }
    }

    pub fn set_timer(&mut self, deadline_ustime: i64) -> TimerId {
        self.timers.set(deadline_ustime)
    }

    pub fn clear_timer(&mut self, id: TimerId) {
        self.timers.clear(id);
    }

    /// Awaits the next armed timer's deadline and returns every timer id due
    /// at that point. Never resolves if no timer is armed — callers should
    /// race this inside `tokio::select!` alongside other event sources, or
    /// guard with `timers_armed()`.
    pub async fn sleep_until_next_timer(&mut self) -> Vec<TimerId> {
        loop {
            let Some(deadline) = self.timers.next_deadline() else {
                std::future::pending::<()>().await;
                unreachable!();
            };
            sleep_until(self.to_tokio_instant(deadline)).await;
            let due = self.timers.pop_due(self.now_ustime());
            if !due.is_empty() {
                return due;
            }
        }
    }

    pub fn timers_armed(&mut self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_timer_set_in_the_past_immediately() {
        let mut el = EventLoop::new(0);
        let now = el.now_ustime();
        el.set_timer(now - 1000);
        let due = el.sleep_until_next_timer().await;
        assert_eq!(due.len(), 1);
    }
}
