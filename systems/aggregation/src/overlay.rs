//! Cross-match overlay dataset and its hash-derived entity colors.

use std::collections::HashMap;

use match_atlas_core::{EntityId, EventKind, MapId, Rgb, TelemetryEvent, WorldPoint};
use serde::{Deserialize, Serialize};

const HASH_MASK: u32 = 0x0FFF_FFFF;
const OVERLAY_SATURATION: u8 = 70;
const OVERLAY_LIGHTNESS: u8 = 60;

/// Hue/saturation/lightness triple with percentages in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HslColor {
    /// Hue in degrees, `0..360`.
    pub hue: u16,
    /// Saturation percentage.
    pub saturation: u8,
    /// Lightness percentage.
    pub lightness: u8,
}

impl HslColor {
    /// Converts the color to 8-bit RGB, rounding each channel.
    #[must_use]
    pub fn to_rgb(self) -> Rgb {
        let hue = f64::from(self.hue % 360);
        let saturation = f64::from(self.saturation.min(100)) / 100.0;
        let lightness = f64::from(self.lightness.min(100)) / 100.0;

        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let sector = hue / 60.0;
        let second = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
        let (red, green, blue) = match sector as u32 {
            0 => (chroma, second, 0.0),
            1 => (second, chroma, 0.0),
            2 => (0.0, chroma, second),
            3 => (0.0, second, chroma),
            4 => (second, 0.0, chroma),
            _ => (chroma, 0.0, second),
        };
        let offset = lightness - chroma / 2.0;
        let channel = |value: f64| ((value + offset) * 255.0).round().clamp(0.0, 255.0) as u8;

        Rgb::new(channel(red), channel(green), channel(blue))
    }
}

/// Deterministic overlay color for an entity, independent of load order.
///
/// The hash folds the identifier's UTF-16 code units as `h = h * 31 + unit`,
/// truncated to 28 bits, and uses `h mod 360` as the hue.
#[must_use]
pub fn overlay_color(uid: &EntityId) -> HslColor {
    let hash = uid.as_str().encode_utf16().fold(0u32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(u32::from(unit)) & HASH_MASK
    });
    HslColor {
        hue: (hash % 360) as u16,
        saturation: OVERLAY_SATURATION,
        lightness: OVERLAY_LIGHTNESS,
    }
}

/// Position history of one entity concatenated across every loaded match.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayPath {
    /// Entity the path belongs to.
    pub uid: EntityId,
    /// Whether the entity was a bot when first seen.
    pub is_bot: bool,
    /// Hash-derived color.
    pub color: HslColor,
    /// Position samples in load order.
    pub points: Vec<WorldPoint>,
}

/// Unique entity counts of an overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySummary {
    /// Distinct human entities.
    pub humans: usize,
    /// Distinct bot entities.
    pub bots: usize,
}

/// Per-entity paths gathered from every qualifying match on one map.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayDataset {
    map: MapId,
    matches: usize,
    paths: Vec<OverlayPath>,
}

impl OverlayDataset {
    /// Map the overlay was aggregated for.
    #[must_use]
    pub fn map(&self) -> &MapId {
        &self.map
    }

    /// Number of matches that contributed data.
    #[must_use]
    pub const fn matches(&self) -> usize {
        self.matches
    }

    /// Paths in first-seen order.
    #[must_use]
    pub fn paths(&self) -> &[OverlayPath] {
        &self.paths
    }

    /// Path of a specific entity.
    #[must_use]
    pub fn path(&self, uid: &EntityId) -> Option<&OverlayPath> {
        self.paths.iter().find(|path| &path.uid == uid)
    }

    /// Counts distinct humans and bots.
    #[must_use]
    pub fn summary(&self) -> OverlaySummary {
        let bots = self.paths.iter().filter(|path| path.is_bot).count();
        OverlaySummary {
            humans: self.paths.len() - bots,
            bots,
        }
    }
}

/// Incrementally merges match telemetry into an [`OverlayDataset`].
#[derive(Debug)]
pub(crate) struct OverlayBuilder {
    map: MapId,
    matches: usize,
    paths: Vec<OverlayPath>,
    index: HashMap<EntityId, usize>,
}

impl OverlayBuilder {
    pub(crate) fn new(map: MapId) -> Self {
        Self {
            map,
            matches: 0,
            paths: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn merge(&mut self, events: &[TelemetryEvent]) {
        self.matches += 1;
        for event in events {
            if event.kind != EventKind::Position {
                continue;
            }
            let slot = match self.index.get(&event.uid) {
                Some(&slot) => slot,
                None => {
                    let slot = self.paths.len();
                    self.paths.push(OverlayPath {
                        uid: event.uid.clone(),
                        is_bot: event.is_bot,
                        color: overlay_color(&event.uid),
                        points: Vec::new(),
                    });
                    let _ = self.index.insert(event.uid.clone(), slot);
                    slot
                }
            };
            self.paths[slot].points.push(event.position());
        }
    }

    pub(crate) fn finish(self) -> OverlayDataset {
        OverlayDataset {
            map: self.map,
            matches: self.matches,
            paths: self.paths,
        }
    }
}
