#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the match atlas engine.
//!
//! This crate defines the data surface that connects the excluded data layer,
//! the analytical systems and the presentation adapters. Recorded matches are
//! described by [`MatchSummary`] records and streams of [`TelemetryEvent`]
//! values, maps are described by [`MapCalibration`] entries held in a
//! [`CalibrationTable`], and the coordinate mapper translates world-space
//! samples into the pixel space the map image was authored in.

mod calibration;
pub mod selection;
mod telemetry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use calibration::{
    world_to_pixel, CalibrationError, CalibrationTable, MapCalibration, MapDefinition,
    DEFAULT_PIXEL_SIZE, MAX_PIXEL_SIZE,
};
pub use telemetry::{EventKind, EventTag, TelemetryEvent, TelemetryRecord, WorldPoint};

/// Identifier of a map shipped with the recorded matches.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(String);

impl MapId {
    /// Creates a new map identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Retrieves the textual representation of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a single recorded match (the telemetry file id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Creates a new match identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Retrieves the textual representation of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a player or bot participating in a match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new entity identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Retrieves the textual representation of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns at most the first `count` characters of the identifier.
    #[must_use]
    pub fn prefix(&self, count: usize) -> &str {
        match self.0.char_indices().nth(count) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calendar day label attached to a recorded match (for example `February_10`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(String);

impl Day {
    /// Creates a new day label.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Retrieves the textual representation of the day.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index record identifying a recorded match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Identifier of the telemetry file backing the match.
    pub file_id: MatchId,
    /// Map the match was played on.
    pub map_id: MapId,
    /// Day the match was recorded.
    pub day: Day,
    /// Number of human participants.
    pub humans: u32,
    /// Number of bot participants.
    pub bots: u32,
    /// Number of combat events (kills, deaths and storm deaths) in the match.
    pub combat_events: u32,
}

impl MatchSummary {
    /// Total number of participants, humans and bots combined.
    #[must_use]
    pub const fn participants(&self) -> u32 {
        self.humans.saturating_add(self.bots)
    }
}

/// Opaque 8-bit RGB color assigned to entities and density ramps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red component.
    pub red: u8,
    /// Green component.
    pub green: u8,
    /// Blue component.
    pub blue: u8,
}

impl Rgb {
    /// Creates a new color from byte RGB components.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Creates a color from a packed `0xRRGGBB` literal.
    #[must_use]
    pub const fn from_hex(packed: u32) -> Self {
        Self {
            red: ((packed >> 16) & 0xff) as u8,
            green: ((packed >> 8) & 0xff) as u8,
            blue: (packed & 0xff) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_from_hex_unpacks_channels() {
        assert_eq!(Rgb::from_hex(0x8b5cf6), Rgb::new(0x8b, 0x5c, 0xf6));
    }

    #[test]
    fn entity_prefix_handles_short_identifiers() {
        let long = EntityId::new("0123456789abcdef");
        let short = EntityId::new("abc");

        assert_eq!(long.prefix(8), "01234567");
        assert_eq!(short.prefix(8), "abc");
    }

    #[test]
    fn match_summary_deserialises_index_record() {
        let summary: MatchSummary = serde_json::from_str(
            r#"{"file_id":"m1","map_id":"Lockdown","day":"February_10","humans":3,"bots":9,"combat_events":14}"#,
        )
        .expect("index record should parse");

        assert_eq!(summary.map_id, MapId::new("Lockdown"));
        assert_eq!(summary.participants(), 12);
    }
}
