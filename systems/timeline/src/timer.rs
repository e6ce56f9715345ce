//! Cancellable frame timer used to drive playback.

use std::time::Duration;

/// Identifies one armed run of a [`PlaybackTimer`].
///
/// Handles from earlier runs are rejected after the timer is stopped or
/// restarted, so a tick scheduled before a stop never advances playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Clone, Copy, Debug)]
struct Armed {
    handle: TimerHandle,
    last: Duration,
}

/// Start/tick/stop timer measuring elapsed host time between ticks.
#[derive(Clone, Debug, Default)]
pub struct PlaybackTimer {
    runs: u64,
    armed: Option<Armed>,
}

impl PlaybackTimer {
    /// Creates a stopped timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer at host time `now`, invalidating any earlier handle.
    pub fn start(&mut self, now: Duration) -> TimerHandle {
        self.runs += 1;
        let handle = TimerHandle(self.runs);
        self.armed = Some(Armed { handle, last: now });
        handle
    }

    /// Disarms the timer. Returns `true` when it was armed.
    pub fn stop(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Returns `true` while the timer is armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Handle of the current run, if armed.
    #[must_use]
    pub fn handle(&self) -> Option<TimerHandle> {
        self.armed.map(|armed| armed.handle)
    }

    /// Host time elapsed since the previous tick of the current run.
    ///
    /// Returns `None` for stale handles or a disarmed timer. Host clocks that
    /// step backwards yield a zero interval.
    pub fn tick(&mut self, handle: TimerHandle, now: Duration) -> Option<Duration> {
        let armed = self.armed.as_mut().filter(|armed| armed.handle == handle)?;
        let elapsed = now.saturating_sub(armed.last);
        armed.last = now.max(armed.last);
        Some(elapsed)
    }
}
