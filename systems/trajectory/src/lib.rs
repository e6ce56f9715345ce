#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-entity trajectory reconstruction for a single match.

use std::collections::HashMap;

use glam::Vec2;
use match_atlas_core::{EntityId, EventKind, MapCalibration, Rgb, TelemetryEvent, WorldPoint};

/// Colors handed out to human entities in first-encountered order.
pub const HUMAN_PALETTE: [Rgb; 20] = [
    Rgb::from_hex(0x8b5cf6),
    Rgb::from_hex(0xec4899),
    Rgb::from_hex(0x06b6d4),
    Rgb::from_hex(0x10b981),
    Rgb::from_hex(0xf59e0b),
    Rgb::from_hex(0xef4444),
    Rgb::from_hex(0x6366f1),
    Rgb::from_hex(0x14b8a6),
    Rgb::from_hex(0xf97316),
    Rgb::from_hex(0x84cc16),
    Rgb::from_hex(0xe879f9),
    Rgb::from_hex(0x22d3ee),
    Rgb::from_hex(0xa3e635),
    Rgb::from_hex(0xfb923c),
    Rgb::from_hex(0xa78bfa),
    Rgb::from_hex(0x2dd4bf),
    Rgb::from_hex(0xfacc15),
    Rgb::from_hex(0xfb7185),
    Rgb::from_hex(0x38bdf8),
    Rgb::from_hex(0x4ade80),
];

/// Single neutral color shared by every bot.
pub const BOT_COLOR: Rgb = Rgb::from_hex(0x94a3b8);

/// Entity-class filter applied while building trajectories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityFilter {
    /// Whether bots contribute trajectories.
    pub include_bots: bool,
}

impl Default for EntityFilter {
    fn default() -> Self {
        Self { include_bots: true }
    }
}

/// Position sample belonging to a trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionSample {
    /// World-space location of the sample.
    pub point: WorldPoint,
    /// Recording timestamp of the sample.
    pub ts: f64,
}

/// Visual shape a trajectory resolves to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathShape {
    /// No position samples; only annotation markers are drawn.
    MarkersOnly,
    /// Exactly one position sample, drawn as a lone point.
    Point(PositionSample),
    /// Two or more samples, drawn as a polyline with a head at the last sample.
    Polyline {
        /// Most recent sample, where the head marker is drawn.
        head: PositionSample,
    },
}

/// Reconstructed journey of a single entity up to a cutoff.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    /// Entity the trajectory belongs to.
    pub uid: EntityId,
    /// Whether the entity is a bot, taken from its first included event.
    pub is_bot: bool,
    /// Color assigned to the entity.
    pub color: Rgb,
    /// Ordered position samples.
    pub positions: Vec<PositionSample>,
    /// Ordered non-position events.
    pub events: Vec<TelemetryEvent>,
}

impl Trajectory {
    fn new(uid: EntityId, is_bot: bool) -> Self {
        Self {
            uid,
            is_bot,
            color: BOT_COLOR,
            positions: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Classifies the trajectory by its number of position samples.
    #[must_use]
    pub fn shape(&self) -> PathShape {
        match self.positions.as_slice() {
            [] => PathShape::MarkersOnly,
            [only] => PathShape::Point(*only),
            [.., last] => PathShape::Polyline { head: *last },
        }
    }
}

/// Builds per-entity trajectories from an ordered event stream.
///
/// The builder keeps its uid index between calls so repeated recomputation does
/// not reallocate; the trajectories themselves are always rebuilt from scratch.
#[derive(Debug, Default)]
pub struct TrajectoryBuilder {
    index: HashMap<EntityId, usize>,
}

impl TrajectoryBuilder {
    /// Creates a builder with an empty scratch index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups events by entity, keeping those recorded at or before `cutoff`.
    ///
    /// Trajectories are returned in first-encountered order. Humans receive
    /// palette colors in that same order, wrapping around the palette; bots
    /// share [`BOT_COLOR`].
    pub fn build(
        &mut self,
        events: &[TelemetryEvent],
        cutoff: f64,
        filter: EntityFilter,
    ) -> Vec<Trajectory> {
        self.index.clear();
        let mut trajectories: Vec<Trajectory> = Vec::new();

        for event in events {
            if event.ts > cutoff {
                continue;
            }
            if event.is_bot && !filter.include_bots {
                continue;
            }

            let slot = match self.index.get(&event.uid) {
                Some(&slot) => slot,
                None => {
                    let slot = trajectories.len();
                    trajectories.push(Trajectory::new(event.uid.clone(), event.is_bot));
                    let _ = self.index.insert(event.uid.clone(), slot);
                    slot
                }
            };

            let trajectory = &mut trajectories[slot];
            if event.kind == EventKind::Position {
                trajectory.positions.push(PositionSample {
                    point: event.position(),
                    ts: event.ts,
                });
            } else {
                trajectory.events.push(event.clone());
            }
        }

        assign_colors(&mut trajectories);
        trajectories
    }
}

fn assign_colors(trajectories: &mut [Trajectory]) {
    let mut next_human = 0usize;
    for trajectory in trajectories {
        if trajectory.is_bot {
            trajectory.color = BOT_COLOR;
        } else {
            trajectory.color = HUMAN_PALETTE[next_human % HUMAN_PALETTE.len()];
            next_human += 1;
        }
    }
}

/// Convenience wrapper around [`TrajectoryBuilder::build`] for one-off use.
#[must_use]
pub fn build_trajectories(
    events: &[TelemetryEvent],
    cutoff: f64,
    filter: EntityFilter,
) -> Vec<Trajectory> {
    TrajectoryBuilder::new().build(events, cutoff, filter)
}

/// Finds the annotation event nearest to `target`, in map pixels.
///
/// Only events at or before `cutoff` that pass `visible` and lie strictly
/// closer than `radius` are considered. Ties keep the earliest event.
#[must_use]
pub fn nearest_annotation<'a, F>(
    events: &'a [TelemetryEvent],
    cutoff: f64,
    calibration: &MapCalibration,
    target: Vec2,
    radius: f32,
    visible: F,
) -> Option<&'a TelemetryEvent>
where
    F: Fn(&TelemetryEvent) -> bool,
{
    let mut closest: Option<(&TelemetryEvent, f32)> = None;
    for event in events {
        if event.ts > cutoff || !event.kind.is_annotation() || !visible(event) {
            continue;
        }
        let distance = calibration.world_to_pixel(event.x, event.z).distance(target);
        if distance >= radius {
            continue;
        }
        if closest.map_or(true, |(_, best)| distance < best) {
            closest = Some((event, distance));
        }
    }
    closest.map(|(event, _)| event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_atlas_core::EventTag;

    fn event(ts: f64, uid: &str, is_bot: bool, tag: EventTag) -> TelemetryEvent {
        TelemetryEvent::new(ts, EntityId::new(uid), is_bot, tag, ts, -ts)
    }

    #[test]
    fn shape_follows_sample_count() {
        let mut trajectory = Trajectory::new(EntityId::new("u"), false);
        assert_eq!(trajectory.shape(), PathShape::MarkersOnly);

        let first = PositionSample {
            point: WorldPoint::new(1.0, 2.0),
            ts: 0.0,
        };
        trajectory.positions.push(first);
        assert_eq!(trajectory.shape(), PathShape::Point(first));

        let second = PositionSample {
            point: WorldPoint::new(3.0, 4.0),
            ts: 1.0,
        };
        trajectory.positions.push(second);
        assert_eq!(trajectory.shape(), PathShape::Polyline { head: second });
    }

    #[test]
    fn palette_wraps_after_twenty_humans() {
        let events: Vec<_> = (0..22)
            .map(|index| event(f64::from(index), &format!("human-{index}"), false, EventTag::Position))
            .collect();

        let trajectories = build_trajectories(&events, f64::MAX, EntityFilter::default());

        assert_eq!(trajectories[0].color, HUMAN_PALETTE[0]);
        assert_eq!(trajectories[19].color, HUMAN_PALETTE[19]);
        assert_eq!(trajectories[20].color, HUMAN_PALETTE[0]);
        assert_eq!(trajectories[21].color, HUMAN_PALETTE[1]);
    }

    #[test]
    fn bots_do_not_consume_palette_slots() {
        let events = vec![
            event(0.0, "bot", true, EventTag::BotPosition),
            event(1.0, "first", false, EventTag::Position),
            event(2.0, "second", false, EventTag::Position),
        ];

        let trajectories = build_trajectories(&events, f64::MAX, EntityFilter::default());

        assert_eq!(trajectories[0].color, BOT_COLOR);
        assert_eq!(trajectories[1].color, HUMAN_PALETTE[0]);
        assert_eq!(trajectories[2].color, HUMAN_PALETTE[1]);
    }

    #[test]
    fn nearest_annotation_respects_radius_cutoff_and_filter() {
        let calibration =
            MapCalibration::new(1024.0, 0.0, 0.0, 1024).expect("valid calibration");
        let events = vec![
            TelemetryEvent::new(0.0, EntityId::new("a"), false, EventTag::Position, 10.0, 1014.0),
            TelemetryEvent::new(1.0, EntityId::new("a"), false, EventTag::Kill, 12.0, 1014.0),
            TelemetryEvent::new(2.0, EntityId::new("b"), true, EventTag::BotKill, 10.0, 1014.0),
            TelemetryEvent::new(3.0, EntityId::new("c"), false, EventTag::Loot, 40.0, 1014.0),
        ];
        let target = Vec2::new(10.0, 10.0);

        let all = nearest_annotation(&events, f64::MAX, &calibration, target, 10.0, |_| true);
        assert_eq!(all.map(|event| event.tag), Some(EventTag::BotKill));

        let humans =
            nearest_annotation(&events, f64::MAX, &calibration, target, 10.0, |e| !e.is_bot);
        assert_eq!(humans.map(|event| event.tag), Some(EventTag::Kill));

        let early = nearest_annotation(&events, 0.5, &calibration, target, 10.0, |_| true);
        assert!(early.is_none());
    }

    #[test]
    fn builder_reuse_does_not_leak_previous_entities() {
        let mut builder = TrajectoryBuilder::new();
        let first = vec![event(0.0, "a", false, EventTag::Position)];
        let second = vec![event(0.0, "b", false, EventTag::Position)];

        let _ = builder.build(&first, f64::MAX, EntityFilter::default());
        let rebuilt = builder.build(&second, f64::MAX, EntityFilter::default());

        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].uid, EntityId::new("b"));
        assert_eq!(rebuilt[0].color, HUMAN_PALETTE[0]);
    }
}
