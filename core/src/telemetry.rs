//! Telemetry events recorded during a match.

use serde::{Deserialize, Serialize};

use crate::{EntityId, Rgb};

/// Semantic kind of a telemetry event.
///
/// Bot and human spellings of the same occurrence collapse into one kind; the
/// emitting entity's class is carried separately on the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Continuous position sample.
    Position,
    /// The entity eliminated another participant.
    CombatKill,
    /// The entity was eliminated in combat.
    CombatDeath,
    /// The entity was eliminated by the storm.
    StormDeath,
    /// The entity picked up loot.
    Loot,
}

impl EventKind {
    /// Returns `true` for discrete events rendered as annotation markers.
    #[must_use]
    pub const fn is_annotation(self) -> bool {
        !matches!(self, Self::Position)
    }

    /// Returns `true` for kills, combat deaths and storm deaths.
    #[must_use]
    pub const fn is_combat(self) -> bool {
        matches!(self, Self::CombatKill | Self::CombatDeath | Self::StormDeath)
    }

    /// Accent color used for markers of this kind.
    #[must_use]
    pub const fn accent(self) -> Rgb {
        match self {
            Self::Position => Rgb::from_hex(0x94a3b8),
            Self::CombatKill => Rgb::from_hex(0xef4444),
            Self::CombatDeath => Rgb::from_hex(0xf97316),
            Self::StormDeath => Rgb::from_hex(0x06b6d4),
            Self::Loot => Rgb::from_hex(0x22c55e),
        }
    }
}

/// Event tag exactly as spelled by the recording pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTag {
    /// Human position sample.
    Position,
    /// Bot position sample.
    BotPosition,
    /// Kill of a human.
    Kill,
    /// Kill of a bot.
    BotKill,
    /// Death at the hands of a human.
    Killed,
    /// Death at the hands of a bot.
    BotKilled,
    /// Death caused by the storm.
    KilledByStorm,
    /// Loot pickup.
    Loot,
}

impl EventTag {
    /// Collapses the tag into its semantic kind.
    #[must_use]
    pub const fn kind(self) -> EventKind {
        match self {
            Self::Position | Self::BotPosition => EventKind::Position,
            Self::Kill | Self::BotKill => EventKind::CombatKill,
            Self::Killed | Self::BotKilled => EventKind::CombatDeath,
            Self::KilledByStorm => EventKind::StormDeath,
            Self::Loot => EventKind::Loot,
        }
    }

    /// Human-readable label shown when inspecting an event.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Position | Self::BotPosition => "Position",
            Self::Kill => "Player Kill",
            Self::BotKill => "Bot Kill",
            Self::Killed => "Player Death",
            Self::BotKilled => "Killed by Bot",
            Self::KilledByStorm => "Storm Death",
            Self::Loot => "Loot Pickup",
        }
    }
}

/// Location expressed in the simulation's world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// World-space x coordinate.
    pub x: f64,
    /// World-space z coordinate.
    pub z: f64,
}

impl WorldPoint {
    /// Creates a new world-space point.
    #[must_use]
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }
}

/// Immutable telemetry sample recorded for one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "TelemetryRecord", into = "TelemetryRecord")]
pub struct TelemetryEvent {
    /// Recording timestamp, monotonic within a match.
    pub ts: f64,
    /// Entity that produced the event.
    pub uid: EntityId,
    /// Whether the entity is a bot.
    pub is_bot: bool,
    /// Semantic kind of the event.
    pub kind: EventKind,
    /// Source spelling of the event, kept for labelling.
    pub tag: EventTag,
    /// World-space x coordinate.
    pub x: f64,
    /// World-space z coordinate.
    pub z: f64,
}

impl TelemetryEvent {
    /// Creates a new event, deriving its kind from the tag.
    #[must_use]
    pub fn new(ts: f64, uid: EntityId, is_bot: bool, tag: EventTag, x: f64, z: f64) -> Self {
        Self {
            ts,
            uid,
            is_bot,
            kind: tag.kind(),
            tag,
            x,
            z,
        }
    }

    /// World-space location of the event.
    #[must_use]
    pub const fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.z)
    }
}

/// Wire record of a telemetry event as stored in per-match files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Recording timestamp.
    pub ts: f64,
    /// Entity identifier.
    pub uid: EntityId,
    /// Bot flag.
    #[serde(default)]
    pub bot: bool,
    /// Event tag.
    pub e: EventTag,
    /// World-space x coordinate.
    pub x: f64,
    /// World-space z coordinate.
    pub z: f64,
}

impl From<TelemetryRecord> for TelemetryEvent {
    fn from(record: TelemetryRecord) -> Self {
        Self::new(
            record.ts, record.uid, record.bot, record.e, record.x, record.z,
        )
    }
}

impl From<TelemetryEvent> for TelemetryRecord {
    fn from(event: TelemetryEvent) -> Self {
        Self {
            ts: event.ts,
            uid: event.uid,
            bot: event.is_bot,
            e: event.tag,
            x: event.x,
            z: event.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_and_human_tags_collapse_to_one_kind() {
        assert_eq!(EventTag::Kill.kind(), EventTag::BotKill.kind());
        assert_eq!(EventTag::Killed.kind(), EventTag::BotKilled.kind());
        assert_eq!(EventTag::BotPosition.kind(), EventKind::Position);
        assert_eq!(EventTag::KilledByStorm.kind(), EventKind::StormDeath);
    }

    #[test]
    fn telemetry_record_parses_into_event() {
        let event: TelemetryEvent = serde_json::from_str(
            r#"{"ts":12.5,"uid":"bot-7","bot":true,"e":"BotKilled","x":10.0,"z":-4.0,"y":3.0}"#,
        )
        .expect("record should parse");

        assert_eq!(event.kind, EventKind::CombatDeath);
        assert_eq!(event.tag, EventTag::BotKilled);
        assert!(event.is_bot);
        assert_eq!(event.position(), WorldPoint::new(10.0, -4.0));
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let parsed = serde_json::from_str::<TelemetryEvent>(
            r#"{"ts":1,"uid":"u","bot":false,"e":"Teleport","x":0,"z":0}"#,
        );

        assert!(parsed.is_err());
    }

    #[test]
    fn annotation_classification() {
        assert!(!EventKind::Position.is_annotation());
        assert!(EventKind::Loot.is_annotation());
        assert!(!EventKind::Loot.is_combat());
        assert!(EventKind::StormDeath.is_combat());
    }
}
