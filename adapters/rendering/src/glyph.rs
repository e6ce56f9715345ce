//! Event marker glyphs and their expansion into primitive shapes.

use glam::Vec2;
use match_atlas_core::EventKind;
use serde::{Deserialize, Serialize};

use crate::{Color, DrawCommand, Stroke};

/// Base marker size in screen pixels; divided by zoom when composing.
pub const MARKER_SIZE: f32 = 6.0;

const LIGHTNING: [(f32, f32); 6] = [
    (-0.3, -1.0),
    (0.3, -0.1),
    (-0.1, -0.1),
    (0.3, 1.0),
    (-0.3, 0.1),
    (0.1, 0.1),
];
const DIAMOND: [(f32, f32); 4] = [(0.0, -0.7), (0.5, 0.0), (0.0, 0.7), (-0.5, 0.0)];

/// Symbol drawn at an annotation event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerGlyph {
    /// Filled dot inside a faint ring, for kills.
    Crosshair,
    /// Diagonal cross over a faint disc, for combat deaths.
    Cross,
    /// Lightning bolt over a faint disc, for storm deaths.
    Lightning,
    /// Diamond over a faint disc, for loot.
    Diamond,
}

impl MarkerGlyph {
    /// Glyph used for `kind`; position samples have none.
    #[must_use]
    pub const fn for_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Position => None,
            EventKind::CombatKill => Some(Self::Crosshair),
            EventKind::CombatDeath => Some(Self::Cross),
            EventKind::StormDeath => Some(Self::Lightning),
            EventKind::Loot => Some(Self::Diamond),
        }
    }

    /// Accent color of the glyph.
    #[must_use]
    pub fn color(self) -> Color {
        let kind = match self {
            Self::Crosshair => EventKind::CombatKill,
            Self::Cross => EventKind::CombatDeath,
            Self::Lightning => EventKind::StormDeath,
            Self::Diamond => EventKind::Loot,
        };
        Color::from(kind.accent())
    }

    /// Expands the glyph into circles, polylines and polygons.
    ///
    /// `size` is the marker size in map pixels and `zoom` the view scale used
    /// to keep stroke widths constant on screen.
    #[must_use]
    pub fn primitives(self, center: Vec2, size: f32, zoom: f32) -> Vec<DrawCommand> {
        let color = self.color();
        let hairline = |width: f32| width / zoom;
        let at = |(dx, dy): (f32, f32)| center + Vec2::new(dx, dy) * size;

        match self {
            Self::Crosshair => vec![
                DrawCommand::Circle {
                    center,
                    radius: size * 0.6,
                    fill: Some(color),
                    stroke: None,
                },
                DrawCommand::Circle {
                    center,
                    radius: size * 1.2,
                    fill: None,
                    stroke: Some(Stroke::solid(color.with_alpha(0.4), hairline(1.5))),
                },
            ],
            Self::Cross => {
                let stroke = Stroke::solid(color, hairline(2.0));
                vec![
                    DrawCommand::Polyline {
                        points: vec![at((-0.6, -0.6)), at((0.6, 0.6))],
                        stroke,
                    },
                    DrawCommand::Polyline {
                        points: vec![at((0.6, -0.6)), at((-0.6, 0.6))],
                        stroke,
                    },
                    DrawCommand::Circle {
                        center,
                        radius: size,
                        fill: Some(color.with_alpha(0.3)),
                        stroke: None,
                    },
                ]
            }
            Self::Lightning => vec![
                DrawCommand::Polygon {
                    points: LIGHTNING.iter().copied().map(at).collect(),
                    fill: color,
                },
                DrawCommand::Circle {
                    center,
                    radius: size * 1.2,
                    fill: Some(color.with_alpha(0.3)),
                    stroke: None,
                },
            ],
            Self::Diamond => vec![
                DrawCommand::Polygon {
                    points: DIAMOND.iter().copied().map(at).collect(),
                    fill: color,
                },
                DrawCommand::Circle {
                    center,
                    radius: size,
                    fill: Some(color.with_alpha(0.25)),
                    stroke: None,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_annotation_kind_has_a_glyph() {
        assert_eq!(MarkerGlyph::for_kind(EventKind::Position), None);
        assert_eq!(
            MarkerGlyph::for_kind(EventKind::StormDeath),
            Some(MarkerGlyph::Lightning)
        );
        assert_eq!(
            MarkerGlyph::Crosshair.color(),
            Color::from_rgb_u8(0xef, 0x44, 0x44)
        );
    }

    #[test]
    fn diamond_expands_around_its_centre() {
        let center = Vec2::new(100.0, 50.0);
        let primitives = MarkerGlyph::Diamond.primitives(center, 10.0, 2.0);

        let DrawCommand::Polygon { points, .. } = &primitives[0] else {
            panic!("diamond starts with its polygon");
        };
        assert_eq!(points[0], Vec2::new(100.0, 43.0));
        assert_eq!(points[1], Vec2::new(105.0, 50.0));
        assert_eq!(primitives.len(), 2);
    }

    #[test]
    fn cross_strokes_stay_constant_on_screen() {
        let primitives = MarkerGlyph::Cross.primitives(Vec2::ZERO, 3.0, 4.0);

        let DrawCommand::Polyline { stroke, .. } = &primitives[0] else {
            panic!("cross starts with a stroke");
        };
        assert_eq!(stroke.width, 0.5);
    }
}
