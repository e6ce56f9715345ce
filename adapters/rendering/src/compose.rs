//! Frame composition from view state and session datasets.

use glam::Vec2;
use match_atlas_core::{CalibrationTable, MapCalibration, MapId, Rgb};
use match_atlas_session::{query, ActiveMatch, Session};
use match_atlas_system_aggregation::{OverlayDataset, PooledEvents};
use match_atlas_system_density::{DensityEstimator, OpacityMask};
use match_atlas_system_trajectory::{EntityFilter, PathShape, Trajectory, TrajectoryBuilder};
use tracing::debug;

use crate::{
    Color, DrawCommand, DrawList, MarkerGlyph, RenderError, Stroke, ViewMode, ViewState,
    MARKER_SIZE,
};

const HEAD_OUTLINE_HUMAN: Rgb = Rgb::from_hex(0xffffff);
const HEAD_OUTLINE_BOT: Rgb = Rgb::from_hex(0x475569);

/// Borrowed datasets a frame is composed from.
#[derive(Clone, Copy, Debug)]
pub struct RenderSources<'a> {
    /// Calibrations used to project world coordinates.
    pub calibrations: &'a CalibrationTable,
    /// Match bound to the view, if any.
    pub active: Option<&'a ActiveMatch>,
    /// Timeline cursor; events after it are hidden.
    pub cursor: f64,
    /// Cross-match overlay, when overlay mode is on.
    pub overlay: Option<&'a OverlayDataset>,
    /// Pooled events of the active map, when loaded.
    pub pooled: Option<&'a PooledEvents>,
    /// Walkable-area mask applied to density images.
    pub mask: Option<&'a OpacityMask>,
}

impl<'a> RenderSources<'a> {
    /// Collects everything the session currently exposes for drawing.
    #[must_use]
    pub fn from_session(session: &'a Session) -> Self {
        Self {
            calibrations: query::calibrations(session),
            active: query::active_match(session),
            cursor: query::cursor(session),
            overlay: query::overlay(session),
            pooled: query::pooled_for_active_map(session),
            mask: None,
        }
    }

    /// Attaches a walkable-area mask.
    #[must_use]
    pub const fn with_mask(mut self, mask: &'a OpacityMask) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Reusable frame composer.
///
/// Holds scratch buffers so recomposing every frame does not reallocate.
#[derive(Debug, Default)]
pub struct Renderer {
    trajectories: TrajectoryBuilder,
    points: Vec<Vec2>,
}

impl Renderer {
    /// Creates a renderer with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the draw list for one frame.
    ///
    /// The map image always comes first. An active overlay replaces the
    /// journey and heatmap layers.
    pub fn compose(
        &mut self,
        view: &ViewState,
        sources: &RenderSources<'_>,
    ) -> Result<DrawList, RenderError> {
        let map = frame_map(sources).ok_or(RenderError::NothingToRender)?;
        let definition = sources.calibrations.definition(map)?;
        let calibration = &definition.calibration;

        let mut list = DrawList::new(view.transform);
        list.commands.push(DrawCommand::MapImage {
            map: map.clone(),
            image: definition.image.clone(),
            size: calibration.pixel_size() as f32,
        });

        if let Some(overlay) = sources.overlay {
            overlay_layer(&mut list, view, overlay, calibration);
        } else if let Some(active) = sources.active {
            match view.mode {
                ViewMode::Journeys => {
                    self.journey_layer(&mut list, view, active, sources.cursor, calibration);
                }
                ViewMode::Heatmap => {
                    self.heatmap_layer(&mut list, view, sources, active, calibration)?;
                }
            }
        }

        debug!(map = %map, commands = list.commands.len(), "composed frame");
        Ok(list)
    }

    fn journey_layer(
        &mut self,
        list: &mut DrawList,
        view: &ViewState,
        active: &ActiveMatch,
        cursor: f64,
        calibration: &MapCalibration,
    ) {
        let zoom = view.transform.zoom();
        let filter = EntityFilter {
            include_bots: view.filters.bots,
        };
        let trajectories = self.trajectories.build(active.events(), cursor, filter);

        if view.filters.paths {
            for trajectory in &trajectories {
                path_commands(list, trajectory, calibration, zoom);
            }
        }

        for trajectory in &trajectories {
            for event in &trajectory.events {
                if !view.filters.shows(event.kind) {
                    continue;
                }
                if let Some(glyph) = MarkerGlyph::for_kind(event.kind) {
                    list.commands.push(DrawCommand::Marker {
                        center: calibration.world_to_pixel(event.x, event.z),
                        glyph,
                        size: MARKER_SIZE / zoom,
                    });
                }
            }
        }
    }

    fn heatmap_layer(
        &mut self,
        list: &mut DrawList,
        view: &ViewState,
        sources: &RenderSources<'_>,
        active: &ActiveMatch,
        calibration: &MapCalibration,
    ) -> Result<(), RenderError> {
        let params = view.heatmap.params;
        let pooled = sources
            .pooled
            .filter(|pooled| view.heatmap.aggregate && pooled.map() == active.map());

        self.points.clear();
        match pooled {
            Some(pooled) => self.points.extend(
                pooled
                    .events()
                    .iter()
                    .filter(|event| params.mode.selects(event.kind))
                    .map(|event| calibration.world_to_pixel(event.x, event.z)),
            ),
            None => self.points.extend(
                active
                    .events()
                    .iter()
                    .filter(|event| event.ts <= sources.cursor && params.mode.selects(event.kind))
                    .map(|event| calibration.world_to_pixel(event.x, event.z)),
            ),
        }

        let canvas = calibration.pixel_size();
        let image = DensityEstimator::new(params).estimate(&self.points, canvas, sources.mask)?;
        if !image.is_empty() {
            list.commands.push(DrawCommand::DensityImage {
                size: canvas as f32,
                image,
            });
        }
        Ok(())
    }
}

/// One-shot composition with a fresh [`Renderer`].
pub fn compose(view: &ViewState, sources: &RenderSources<'_>) -> Result<DrawList, RenderError> {
    Renderer::new().compose(view, sources)
}

fn path_commands(
    list: &mut DrawList,
    trajectory: &Trajectory,
    calibration: &MapCalibration,
    zoom: f32,
) {
    let color = Color::from(trajectory.color);
    let head_radius = (if trajectory.is_bot { 3.5 } else { 5.0 }) / zoom;

    match trajectory.shape() {
        PathShape::MarkersOnly => {}
        PathShape::Point(sample) => list.commands.push(DrawCommand::Circle {
            center: calibration.world_to_pixel(sample.point.x, sample.point.z),
            radius: head_radius,
            fill: Some(color.with_alpha(0.75)),
            stroke: None,
        }),
        PathShape::Polyline { head } => {
            let points = trajectory
                .positions
                .iter()
                .map(|sample| calibration.world_to_pixel(sample.point.x, sample.point.z))
                .collect();
            let stroke = if trajectory.is_bot {
                Stroke::dashed(color.with_alpha(0.45), 1.2 / zoom, [4.0 / zoom, 4.0 / zoom])
            } else {
                Stroke::solid(color.with_alpha(0.65), 2.0 / zoom)
            };
            list.commands.push(DrawCommand::Polyline { points, stroke });

            let (fill_alpha, outline) = if trajectory.is_bot {
                (0.75, Color::from(HEAD_OUTLINE_BOT).with_alpha(0.6))
            } else {
                (0.95, Color::from(HEAD_OUTLINE_HUMAN).with_alpha(0.7))
            };
            list.commands.push(DrawCommand::Circle {
                center: calibration.world_to_pixel(head.point.x, head.point.z),
                radius: head_radius,
                fill: Some(color.with_alpha(fill_alpha)),
                stroke: Some(Stroke::solid(outline, 1.0 / zoom)),
            });
        }
    }
}

fn overlay_layer(
    list: &mut DrawList,
    view: &ViewState,
    overlay: &OverlayDataset,
    calibration: &MapCalibration,
) {
    let zoom = view.transform.zoom();
    let bots = overlay.paths().iter().filter(|path| path.is_bot);
    let humans = overlay.paths().iter().filter(|path| !path.is_bot);

    for path in bots.filter(|_| view.filters.bots).chain(humans) {
        if path.points.len() < 2 {
            continue;
        }
        let color = Color::from(path.color.to_rgb());
        let points: Vec<Vec2> = path
            .points
            .iter()
            .map(|point| calibration.world_to_pixel(point.x, point.z))
            .collect();
        let head = points.last().copied().filter(|_| !path.is_bot);

        let stroke = if path.is_bot {
            Stroke::dashed(color.with_alpha(0.18), 0.8 / zoom, [3.0 / zoom, 4.0 / zoom])
        } else {
            Stroke::solid(color.with_alpha(0.55), 1.5 / zoom)
        };
        list.commands.push(DrawCommand::Polyline { points, stroke });

        if let Some(center) = head {
            list.commands.push(DrawCommand::Circle {
                center,
                radius: 4.0 / zoom,
                fill: Some(color.with_alpha(0.85)),
                stroke: None,
            });
        }
    }
}

/// Map a frame would be drawn on; the overlay's map wins over the active match.
pub(crate) fn frame_map<'a>(sources: &RenderSources<'a>) -> Option<&'a MapId> {
    sources
        .overlay
        .map(OverlayDataset::map)
        .or_else(|| sources.active.map(ActiveMatch::map))
}
