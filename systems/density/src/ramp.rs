//! Heatmap modes and their color ramps.

use std::{fmt, str::FromStr};

use match_atlas_core::{EventKind, Rgb};
use serde::{Deserialize, Serialize};

/// Piecewise-linear color ramp with four evenly spaced stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorRamp {
    stops: [Rgb; 4],
}

impl ColorRamp {
    /// Creates a ramp from its stops, ordered from sparse to dense.
    #[must_use]
    pub const fn new(stops: [Rgb; 4]) -> Self {
        Self { stops }
    }

    /// Stops of the ramp.
    #[must_use]
    pub const fn stops(&self) -> &[Rgb; 4] {
        &self.stops
    }

    /// Samples the ramp at `t`; see [`sample_color_map`].
    #[must_use]
    pub fn sample(&self, t: f32) -> Rgb {
        sample_color_map(self, t)
    }
}

/// Interpolates linearly between the two stops bracketing `t`.
///
/// `t` is clamped to `0.0..=1.0`; `0.0` and `1.0` return the first and last
/// stops exactly. Channels are floored to whole bytes.
#[must_use]
pub fn sample_color_map(ramp: &ColorRamp, t: f32) -> Rgb {
    let stops = ramp.stops();
    let last = stops.len() - 1;
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    let position = t * last as f32;
    let lo = (position.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let frac = position - lo as f32;

    let (from, to) = (stops[lo], stops[hi]);
    Rgb::new(
        lerp_channel(from.red, to.red, frac),
        lerp_channel(from.green, to.green, frac),
        lerp_channel(from.blue, to.blue, frac),
    )
}

fn lerp_channel(from: u8, to: u8, frac: f32) -> u8 {
    let from = f32::from(from);
    let to = f32::from(to);
    (from + (to - from) * frac).floor().clamp(0.0, 255.0) as u8
}

/// Event population a heatmap is computed from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeatmapMode {
    /// Position samples.
    #[default]
    Traffic,
    /// Combat kills.
    Kills,
    /// Combat and storm deaths.
    Deaths,
    /// Loot pickups.
    Loot,
}

impl HeatmapMode {
    /// Every mode in presentation order.
    pub const ALL: [HeatmapMode; 4] = [Self::Traffic, Self::Kills, Self::Deaths, Self::Loot];

    /// Returns `true` when events of `kind` feed this heatmap.
    #[must_use]
    pub const fn selects(self, kind: EventKind) -> bool {
        match self {
            Self::Traffic => matches!(kind, EventKind::Position),
            Self::Kills => matches!(kind, EventKind::CombatKill),
            Self::Deaths => matches!(kind, EventKind::CombatDeath | EventKind::StormDeath),
            Self::Loot => matches!(kind, EventKind::Loot),
        }
    }

    /// Color ramp used to paint this mode.
    #[must_use]
    pub const fn ramp(self) -> ColorRamp {
        match self {
            Self::Traffic => ColorRamp::new([
                Rgb::new(30, 0, 80),
                Rgb::new(80, 40, 180),
                Rgb::new(140, 80, 220),
                Rgb::new(200, 150, 255),
            ]),
            Self::Kills => ColorRamp::new([
                Rgb::new(80, 0, 0),
                Rgb::new(180, 30, 30),
                Rgb::new(240, 80, 40),
                Rgb::new(255, 200, 60),
            ]),
            Self::Deaths => ColorRamp::new([
                Rgb::new(80, 30, 0),
                Rgb::new(200, 80, 20),
                Rgb::new(240, 150, 40),
                Rgb::new(255, 220, 100),
            ]),
            Self::Loot => ColorRamp::new([
                Rgb::new(0, 40, 20),
                Rgb::new(20, 120, 60),
                Rgb::new(40, 200, 100),
                Rgb::new(120, 255, 160),
            ]),
        }
    }

    /// Lower-case name of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Kills => "kills",
            Self::Deaths => "deaths",
            Self::Loot => "loot",
        }
    }
}

impl fmt::Display for HeatmapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeatmapMode {
    type Err = UnknownHeatmapMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownHeatmapMode(value.to_owned()))
    }
}

/// Error returned when parsing an unrecognised heatmap mode name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown heatmap mode `{0}` (expected traffic, kills, deaths or loot)")]
pub struct UnknownHeatmapMode(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_return_exact_stops() {
        for mode in HeatmapMode::ALL {
            let ramp = mode.ramp();
            assert_eq!(sample_color_map(&ramp, 0.0), ramp.stops()[0]);
            assert_eq!(sample_color_map(&ramp, 1.0), ramp.stops()[3]);
        }
    }

    #[test]
    fn intermediate_values_interpolate_between_bracketing_stops() {
        let ramp = HeatmapMode::Traffic.ramp();

        // t = 0.5 sits halfway between stops 1 and 2.
        assert_eq!(sample_color_map(&ramp, 0.5), Rgb::new(110, 60, 200));
        // t = 1/3 lands exactly on stop 1 (up to float rounding of the fraction).
        let third = sample_color_map(&ramp, 1.0 / 3.0);
        assert!(third.red >= 79 && third.red <= 80);
        assert_eq!(sample_color_map(&ramp, 2.0), ramp.stops()[3]);
        assert_eq!(sample_color_map(&ramp, -1.0), ramp.stops()[0]);
    }

    #[test]
    fn deaths_include_storm_deaths() {
        assert!(HeatmapMode::Deaths.selects(EventKind::StormDeath));
        assert!(HeatmapMode::Deaths.selects(EventKind::CombatDeath));
        assert!(!HeatmapMode::Kills.selects(EventKind::CombatDeath));
        assert!(HeatmapMode::Traffic.selects(EventKind::Position));
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("Loot".parse::<HeatmapMode>(), Ok(HeatmapMode::Loot));
        assert!("storm".parse::<HeatmapMode>().is_err());
    }
}
