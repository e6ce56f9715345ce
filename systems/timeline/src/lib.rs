#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Playback clock bounded by the first and last event of the active match.

mod timer;

use std::time::Duration;

use match_atlas_core::{EventKind, Rgb, TelemetryEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use timer::{PlaybackTimer, TimerHandle};

/// Host time needed to replay a whole match at 1x speed.
pub const PLAYBACK_WINDOW: Duration = Duration::from_millis(15_000);
/// Slowest accepted playback speed multiplier.
pub const MIN_PLAYBACK_SPEED: f64 = 0.01;
/// Number of discrete steps exposed by the time slider.
pub const SLIDER_RESOLUTION: u32 = 1000;

/// Whether playback is advancing the cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// The cursor only moves when seeked.
    #[default]
    Stopped,
    /// Ticks advance the cursor.
    Playing,
}

/// Effect of delivering a timer tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// The tick was stale or playback is stopped; nothing changed.
    Ignored,
    /// The cursor moved to the contained time.
    Advanced(f64),
    /// The cursor reached the end of the match and playback stopped.
    Finished,
}

/// Combat event placed along the timeline track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineMarker {
    /// Position along the track in `0.0..=1.0`.
    pub fraction: f64,
    /// Kind of the event.
    pub kind: EventKind,
    /// Accent color of the kind.
    pub color: Rgb,
}

/// Timeline controller of the active match.
#[derive(Clone, Debug)]
pub struct Timeline {
    min: f64,
    max: f64,
    current: f64,
    speed: f64,
    state: PlaybackState,
    timer: PlaybackTimer,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            current: 0.0,
            speed: 1.0,
            state: PlaybackState::Stopped,
            timer: PlaybackTimer::new(),
        }
    }
}

impl Timeline {
    /// Creates an empty, stopped timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the timeline to a match, stopping playback.
    ///
    /// Bounds come from a full scan so unsorted input still yields the true
    /// first and last timestamps. The cursor starts at the end of the match.
    pub fn load(&mut self, events: &[TelemetryEvent]) {
        let _ = self.stop();
        let bounds = events
            .iter()
            .map(|event| event.ts)
            .filter(|ts| ts.is_finite())
            .fold(None, |bounds: Option<(f64, f64)>, ts| match bounds {
                None => Some((ts, ts)),
                Some((min, max)) => Some((min.min(ts), max.max(ts))),
            });
        let (min, max) = bounds.unwrap_or((0.0, 0.0));
        self.min = min;
        self.max = max;
        self.current = max;
        debug!(min, max, events = events.len(), "timeline loaded");
    }

    /// Timestamp of the earliest event.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Timestamp of the latest event.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Span between the first and last event.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.max - self.min
    }

    /// Current cursor time.
    #[must_use]
    pub const fn current(&self) -> f64 {
        self.current
    }

    /// Playback state.
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Playback speed multiplier.
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Moves the cursor to `time`, clamped to the match bounds.
    pub fn seek(&mut self, time: f64) {
        if time.is_nan() {
            return;
        }
        self.current = time.clamp(self.min, self.max);
    }

    /// Moves the cursor to the normalised position `fraction`.
    pub fn seek_fraction(&mut self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        self.current = self.min + fraction.clamp(0.0, 1.0) * self.duration();
    }

    /// Moves the cursor to a slider step in `0..=SLIDER_RESOLUTION`.
    pub fn seek_slider(&mut self, position: u32) {
        let position = position.min(SLIDER_RESOLUTION);
        self.seek_fraction(f64::from(position) / f64::from(SLIDER_RESOLUTION));
    }

    /// Normalised cursor position, `0.0` for zero-length matches.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        ((self.current - self.min) / duration).clamp(0.0, 1.0)
    }

    /// Slider step matching the cursor, rounded down.
    #[must_use]
    pub fn slider_position(&self) -> u32 {
        (self.fraction() * f64::from(SLIDER_RESOLUTION)).floor() as u32
    }

    /// Rounded progress percentage; zero-length matches report 0.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }

    /// Starts playback at host time `now`, rewinding first when at the end.
    pub fn play(&mut self, now: Duration) -> TimerHandle {
        if self.current >= self.max {
            self.current = self.min;
        }
        self.state = PlaybackState::Playing;
        self.timer.start(now)
    }

    /// Stops playback and releases the scheduled tick. Returns `true` when playing.
    pub fn stop(&mut self) -> bool {
        let _ = self.timer.stop();
        let was_playing = self.state == PlaybackState::Playing;
        self.state = PlaybackState::Stopped;
        was_playing
    }

    /// Starts or stops playback. Returns the new handle when playback started.
    pub fn toggle(&mut self, now: Duration) -> Option<TimerHandle> {
        match self.state {
            PlaybackState::Playing => {
                let _ = self.stop();
                None
            }
            PlaybackState::Stopped => Some(self.play(now)),
        }
    }

    /// Changes the speed multiplier; non-finite values and values below
    /// [`MIN_PLAYBACK_SPEED`] are ignored.
    pub fn set_speed(&mut self, speed: f64) {
        if !speed.is_finite() || speed < MIN_PLAYBACK_SPEED {
            warn!(speed, "ignoring invalid playback speed");
            return;
        }
        self.speed = speed;
    }

    /// Handle of the running playback, if any.
    #[must_use]
    pub fn handle(&self) -> Option<TimerHandle> {
        self.timer.handle()
    }

    /// Advances the cursor by the host time elapsed since the previous tick.
    ///
    /// One [`PLAYBACK_WINDOW`] of host time covers the whole match at 1x.
    pub fn tick(&mut self, handle: TimerHandle, now: Duration) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Ignored;
        }
        let Some(elapsed) = self.timer.tick(handle, now) else {
            return TickOutcome::Ignored;
        };

        let window_ms = PLAYBACK_WINDOW.as_secs_f64() * 1000.0;
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let advance = self.duration() / window_ms * elapsed_ms * self.speed;
        self.current = (self.current + advance).min(self.max);

        if self.current >= self.max {
            let _ = self.stop();
            return TickOutcome::Finished;
        }
        TickOutcome::Advanced(self.current)
    }

    /// Number of events at or before the cursor, assuming ascending order.
    #[must_use]
    pub fn cumulative_count(&self, events: &[TelemetryEvent]) -> usize {
        events
            .iter()
            .take_while(|event| event.ts <= self.current)
            .count()
    }

    /// Combat events positioned along the track; empty for zero-length matches.
    #[must_use]
    pub fn markers(&self, events: &[TelemetryEvent]) -> Vec<TimelineMarker> {
        let duration = self.duration();
        if duration <= 0.0 {
            return Vec::new();
        }
        events
            .iter()
            .filter(|event| event.kind.is_combat())
            .map(|event| TimelineMarker {
                fraction: ((event.ts - self.min) / duration).clamp(0.0, 1.0),
                kind: event.kind,
                color: event.kind.accent(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_atlas_core::{EntityId, EventTag};

    fn at(ts: f64) -> TelemetryEvent {
        TelemetryEvent::new(ts, EntityId::new("u"), false, EventTag::Position, 0.0, 0.0)
    }

    #[test]
    fn bounds_are_scanned_not_assumed() {
        let mut timeline = Timeline::new();
        timeline.load(&[at(5.0), at(1.0), at(9.0), at(3.0)]);

        assert_eq!(timeline.min(), 1.0);
        assert_eq!(timeline.max(), 9.0);
        assert_eq!(timeline.current(), 9.0);
    }

    #[test]
    fn slider_maps_to_time() {
        let mut timeline = Timeline::new();
        timeline.load(&[at(100.0), at(200.0)]);

        timeline.seek_slider(250);

        assert_eq!(timeline.current(), 125.0);
        assert_eq!(timeline.slider_position(), 250);
        assert_eq!(timeline.progress_percent(), 25);
    }

    #[test]
    fn zero_duration_reports_zero_progress() {
        let mut timeline = Timeline::new();
        timeline.load(&[at(7.0), at(7.0)]);

        assert_eq!(timeline.progress_percent(), 0);
        assert_eq!(timeline.slider_position(), 0);
        assert!(timeline.markers(&[at(7.0)]).is_empty());
    }

    #[test]
    fn invalid_speed_is_ignored() {
        let mut timeline = Timeline::new();
        timeline.set_speed(4.0);
        timeline.set_speed(0.0);
        timeline.set_speed(1e-20);
        timeline.set_speed(f64::INFINITY);

        assert_eq!(timeline.speed(), 4.0);
    }
}
