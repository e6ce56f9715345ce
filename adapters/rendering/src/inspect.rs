//! Hover inspection of journey annotations.

use std::fmt;

use glam::Vec2;
use match_atlas_system_trajectory::nearest_annotation;
use serde::Serialize;

use crate::{compose::frame_map, RenderError, RenderSources, ViewMode, ViewState};

/// Hit radius around an annotation, in screen pixels.
pub const HIT_RADIUS: f32 = 10.0;

/// Number of uid characters shown in a tooltip.
pub const UID_PREFIX_LEN: usize = 8;

const TOOLTIP_OFFSET: Vec2 = Vec2::new(15.0, -10.0);

/// Description of the annotation under the pointer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tooltip {
    /// Human-readable event label.
    pub label: &'static str,
    /// Whether the entity is a bot.
    pub is_bot: bool,
    /// Leading characters of the entity uid.
    pub uid_prefix: String,
    /// World x coordinate of the event.
    pub x: f64,
    /// World z coordinate of the event.
    pub z: f64,
    /// Screen position to place the tooltip at.
    pub anchor: Vec2,
}

impl fmt::Display for Tooltip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = if self.is_bot { "Bot" } else { "Human" };
        writeln!(f, "{}", self.label)?;
        writeln!(f, "{class} · {}...", self.uid_prefix)?;
        write!(f, "x: {:.1}, z: {:.1}", self.x, self.z)
    }
}

/// Finds the visible annotation under `screen`, if any.
///
/// Only the journey view of a single match is inspectable. The annotation must
/// respect the kind and bot filters and lie strictly within [`HIT_RADIUS`]
/// screen pixels of the pointer.
pub fn inspect(
    view: &ViewState,
    sources: &RenderSources<'_>,
    screen: Vec2,
) -> Result<Option<Tooltip>, RenderError> {
    if view.mode != ViewMode::Journeys || sources.overlay.is_some() {
        return Ok(None);
    }
    let (Some(active), Some(map)) = (sources.active, frame_map(sources)) else {
        return Ok(None);
    };
    let calibration = sources.calibrations.calibration(map)?;

    let zoom = view.transform.zoom();
    let target = view.transform.to_map(screen);
    let filters = view.filters;
    let hit = nearest_annotation(
        active.events(),
        sources.cursor,
        calibration,
        target,
        HIT_RADIUS / zoom,
        |event| filters.shows(event.kind) && (filters.bots || !event.is_bot),
    );

    Ok(hit.map(|event| Tooltip {
        label: event.tag.label(),
        is_bot: event.is_bot,
        uid_prefix: event.uid.prefix(UID_PREFIX_LEN).to_owned(),
        x: event.x,
        z: event.z,
        anchor: screen + TOOLTIP_OFFSET,
    }))
}
