//! Wall-clock pacing and the simulated clock.
//!
//! `Pacer` decides when the next step is due. Its reference instant moves
//! forward by exactly one interval per step, never by the measured elapsed
//! time, so slow responses do not accumulate drift. `SimClock` counts
//! simulated time in whole steps from the configured start.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::time::Duration;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    reference: Instant,
}

impl Pacer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self { interval, reference: now }
    }

    /// Returns true when a step is due, consuming exactly one interval.
    ///
    /// Called once per scheduler pass, so a backlog of several intervals
    /// still yields a single step per pass.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.reference) >= self.interval {
            self.reference += self.interval;
            true
        } else {
            false
        }
    }

    /// Instant at which the next step becomes due.
    pub fn next_deadline(&self) -> Instant {
        self.reference + self.interval
    }
}

// ---------------------------------------------------------------------------
// Simulated clock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimClock {
    start: NaiveDateTime,
    start_offset_secs: u64,
    step_secs: u64,
    steps: u64,
}

impl SimClock {
    pub fn new(start: NaiveDateTime, start_offset_secs: u64, step_secs: u64) -> Self {
        Self { start, start_offset_secs, step_secs, steps: 0 }
    }

    /// Move forward one step and return the new simulated time.
    pub fn advance(&mut self) -> NaiveDateTime {
        self.steps += 1;
        self.now()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.start + ChronoDuration::seconds(self.elapsed_secs() as i64)
    }

    /// Simulated seconds since the session start.
    pub fn elapsed_secs(&self) -> u64 {
        self.steps * self.step_secs
    }

    /// Simulated seconds since the server epoch.
    pub fn offset_secs(&self) -> u64 {
        self.start_offset_secs + self.elapsed_secs()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
