#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Render orchestration for the match atlas.
//!
//! [`compose`] turns an explicit [`ViewState`] plus the session's derived
//! datasets into an ordered [`DrawList`] expressed in map-pixel space under a
//! single [`ViewTransform`]. Adapters implement [`DrawingSurface`] and receive
//! the list through [`present`]; nothing else in the workspace touches a
//! drawing surface.

mod compose;
mod glyph;
mod inspect;
mod view;

use anyhow::Result as AnyResult;
use glam::Vec2;
use match_atlas_core::{CalibrationError, MapId, Rgb};
use match_atlas_system_density::{DensityError, HeatmapImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use compose::{compose, RenderSources, Renderer};
pub use glyph::{MarkerGlyph, MARKER_SIZE};
pub use inspect::{inspect, Tooltip, HIT_RADIUS, UID_PREFIX_LEN};
pub use view::{
    reduce, EventFilters, FilterToggle, Gesture, HeatmapSettings, ViewEffect, ViewInput,
    ViewMode, ViewState, ViewTransform, Viewport, BUTTON_ZOOM_FACTOR, FIT_MARGIN, MAX_ZOOM,
    MIN_ZOOM, WHEEL_ZOOM_FACTOR,
};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns the same color with a different opacity.
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }

    /// Quantises the color to RGBA bytes.
    #[must_use]
    pub fn to_rgba8(self) -> [u8; 4] {
        let quantise = |channel: f32| (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            quantise(self.red),
            quantise(self.green),
            quantise(self.blue),
            quantise(self.alpha),
        ]
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Self::from_rgb_u8(rgb.red, rgb.green, rgb.blue)
    }
}

/// Line style of a stroked shape.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Stroke color.
    pub color: Color,
    /// Width in map pixels.
    pub width: f32,
    /// Dash and gap lengths in map pixels; `None` draws a solid line.
    pub dash: Option<[f32; 2]>,
}

impl Stroke {
    /// Solid stroke.
    #[must_use]
    pub const fn solid(color: Color, width: f32) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    /// Dashed stroke.
    #[must_use]
    pub const fn dashed(color: Color, width: f32, dash: [f32; 2]) -> Self {
        Self {
            color,
            width,
            dash: Some(dash),
        }
    }
}

/// Single drawing instruction in map-pixel space.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Background map image covering `0..size` on both axes.
    MapImage {
        /// Map being drawn.
        map: MapId,
        /// Image asset configured for the map, if any.
        image: Option<String>,
        /// Edge length of the map canvas.
        size: f32,
    },
    /// Colored, masked density image covering the map canvas.
    DensityImage {
        /// Edge length of the map canvas.
        size: f32,
        /// Pixels of the density image.
        image: HeatmapImage,
    },
    /// Open polyline.
    Polyline {
        /// Vertices in drawing order.
        points: Vec<Vec2>,
        /// Line style.
        stroke: Stroke,
    },
    /// Closed, filled polygon.
    Polygon {
        /// Vertices in drawing order.
        points: Vec<Vec2>,
        /// Fill color.
        fill: Color,
    },
    /// Circle with optional fill and outline.
    Circle {
        /// Centre of the circle.
        center: Vec2,
        /// Radius in map pixels.
        radius: f32,
        /// Fill color.
        fill: Option<Color>,
        /// Outline style.
        stroke: Option<Stroke>,
    },
    /// Event marker glyph.
    Marker {
        /// Centre of the glyph.
        center: Vec2,
        /// Glyph to draw.
        glyph: MarkerGlyph,
        /// Glyph size in map pixels.
        size: f32,
    },
}

/// Ordered drawing instructions sharing one transform.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrawList {
    /// Transform applied to every command.
    pub transform: ViewTransform,
    /// Commands in painting order.
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new(transform: ViewTransform) -> Self {
        Self {
            transform,
            commands: Vec::new(),
        }
    }

    /// Replaces every marker with its primitive shapes.
    #[must_use]
    pub fn expand_markers(self) -> Self {
        let zoom = self.transform.zoom();
        let mut commands = Vec::with_capacity(self.commands.len());
        for command in self.commands {
            match command {
                DrawCommand::Marker {
                    center,
                    glyph,
                    size,
                } => commands.extend(glyph.primitives(center, size, zoom)),
                other => commands.push(other),
            }
        }
        Self {
            transform: self.transform,
            commands,
        }
    }
}

/// Drawing surface implemented by adapters.
pub trait DrawingSurface {
    /// Prepares the surface for a new frame under `transform`.
    fn begin(&mut self, transform: &ViewTransform) -> AnyResult<()>;

    /// Executes one drawing instruction.
    fn draw(&mut self, command: &DrawCommand) -> AnyResult<()>;

    /// Completes the frame.
    fn finish(&mut self) -> AnyResult<()>;
}

/// Replays a draw list onto a surface in order.
pub fn present<S>(list: &DrawList, surface: &mut S) -> AnyResult<()>
where
    S: DrawingSurface + ?Sized,
{
    surface.begin(&list.transform)?;
    for command in &list.commands {
        surface.draw(command)?;
    }
    surface.finish()
}

/// Errors that prevent composing a frame.
#[derive(Debug, PartialEq, Error)]
pub enum RenderError {
    /// Neither an active match nor an overlay is available.
    #[error("nothing to render: no match is selected and no overlay is active")]
    NothingToRender,
    /// The map has no usable calibration.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    /// The density image could not be produced.
    #[error(transparent)]
    Density(#[from] DensityError),
}
