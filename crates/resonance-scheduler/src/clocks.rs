//! Last-run tracking for each sensor, so the control loop only polls a
//! sensor once its configured interval has elapsed (spec §4.5 step 1).

use std::time::{Duration, Instant};

struct Clock {
    last_run: Option<Instant>,
}

impl Clock {
    fn new() -> Self {
        Self { last_run: None }
    }

    /// True if `interval_secs` have passed since the last run (or this is
    /// the first tick). Marks the clock as run in the same call so a
    /// caller can't forget to reset it.
    fn due(&mut self, interval_secs: u64) -> bool {
        let now = Instant::now();
        let elapsed = self.last_run.map(|t| now.duration_since(t) >= Duration::from_secs(interval_secs)).unwrap_or(true);
        if elapsed {
            self.last_run = Some(now);
        }
        elapsed
    }
}

pub struct SensorClocks {
    pub(crate) url: ClockHandle,
    pub(crate) audio_file: ClockHandle,
    pub(crate) health: ClockHandle,
    pub(crate) cleanup: ClockHandle,
    pub(crate) alert_dispatch: ClockHandle,
}

/// Thin wrapper so call sites read `self.clocks.url.due(secs)` instead of
/// reaching through a field-of-struct-of-struct.
pub(crate) struct ClockHandle(Clock);

impl ClockHandle {
    pub(crate) fn due(&mut self, interval_secs: u64) -> bool {
        self.0.due(interval_secs)
    }
}

impl SensorClocks {
    pub fn new() -> Self {
        Self {
            url: ClockHandle(Clock::new()),
            audio_file: ClockHandle(Clock::new()),
            health: ClockHandle(Clock::new()),
            cleanup: ClockHandle(Clock::new()),
            alert_dispatch: ClockHandle(Clock::new()),
        }
    }
}

impl Default for SensorClocks {
    fn default() -> Self {
        Self::new()
    }
}
