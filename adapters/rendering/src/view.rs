//! Explicit view state and the pure reducer that maps input onto it.

use glam::Vec2;
use match_atlas_core::EventKind;
use match_atlas_system_density::{DensityParams, HeatmapMode, Intensity, KernelRadius};
use serde::{Deserialize, Serialize};

/// Smallest zoom factor the view allows.
pub const MIN_ZOOM: f32 = 0.2;
/// Largest zoom factor the view allows.
pub const MAX_ZOOM: f32 = 10.0;
/// Zoom step applied by the zoom buttons.
pub const BUTTON_ZOOM_FACTOR: f32 = 1.3;
/// Zoom step applied per wheel notch.
pub const WHEEL_ZOOM_FACTOR: f32 = 1.15;
/// Share of the viewport the map occupies after a reset.
pub const FIT_MARGIN: f32 = 0.9;

/// Primary analytical view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    /// Per-entity paths and event markers.
    #[default]
    Journeys,
    /// Density of the selected event population.
    Heatmap,
}

/// Toggle exposed by the event filter panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterToggle {
    /// Polylines and head dots.
    Paths,
    /// Kill markers.
    Kills,
    /// Combat death markers.
    Deaths,
    /// Storm death markers.
    Storm,
    /// Loot markers.
    Loot,
    /// Every bot-owned element.
    Bots,
}

/// Visibility of journey elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventFilters {
    /// Draw polylines and head dots.
    pub paths: bool,
    /// Draw kill markers.
    pub kills: bool,
    /// Draw combat death markers.
    pub deaths: bool,
    /// Draw storm death markers.
    pub storm: bool,
    /// Draw loot markers.
    pub loot: bool,
    /// Include bots.
    pub bots: bool,
}

impl Default for EventFilters {
    fn default() -> Self {
        Self {
            paths: true,
            kills: true,
            deaths: true,
            storm: true,
            loot: true,
            bots: true,
        }
    }
}

impl EventFilters {
    /// Returns `true` when markers of `kind` are visible.
    #[must_use]
    pub const fn shows(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Position => false,
            EventKind::CombatKill => self.kills,
            EventKind::CombatDeath => self.deaths,
            EventKind::StormDeath => self.storm,
            EventKind::Loot => self.loot,
        }
    }

    fn set(&mut self, toggle: FilterToggle, visible: bool) {
        let slot = match toggle {
            FilterToggle::Paths => &mut self.paths,
            FilterToggle::Kills => &mut self.kills,
            FilterToggle::Deaths => &mut self.deaths,
            FilterToggle::Storm => &mut self.storm,
            FilterToggle::Loot => &mut self.loot,
            FilterToggle::Bots => &mut self.bots,
        };
        *slot = visible;
    }
}

/// Heatmap parameters chosen by the user.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeatmapSettings {
    /// Kernel radius, intensity and event population.
    pub params: DensityParams,
    /// Pool every match on the map instead of using the active match.
    pub aggregate: bool,
}

/// Size of the drawing surface in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Viewport {
    /// Creates a viewport.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Centre of the viewport.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1024.0, 1024.0)
    }
}

/// Uniform scale followed by a translation: `screen = map * zoom + pan`.
///
/// The zoom always lies in `MIN_ZOOM..=MAX_ZOOM`, deserialised values included.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTransform")]
pub struct ViewTransform {
    zoom: f32,
    pan: Vec2,
}

#[derive(Deserialize)]
struct RawTransform {
    zoom: f32,
    pan: Vec2,
}

impl From<RawTransform> for ViewTransform {
    fn from(raw: RawTransform) -> Self {
        Self::new(raw.zoom, raw.pan)
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl ViewTransform {
    /// Creates a transform, clamping the zoom to the supported range.
    #[must_use]
    pub fn new(zoom: f32, pan: Vec2) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            pan,
        }
    }

    /// Transform that centres a square map of `map_size` pixels in the viewport.
    ///
    /// The fitted zoom is clamped like any other, so a degenerate viewport
    /// still yields an invertible transform.
    #[must_use]
    pub fn fit(viewport: Viewport, map_size: f32) -> Self {
        if !map_size.is_finite() || map_size <= 0.0 {
            return Self::default();
        }
        let zoom = clamp_zoom(viewport.width.min(viewport.height) / map_size * FIT_MARGIN);
        let extent = map_size * zoom;
        Self {
            zoom,
            pan: Vec2::new(
                (viewport.width - extent) / 2.0,
                (viewport.height - extent) / 2.0,
            ),
        }
    }

    /// Scale factor.
    #[must_use]
    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Translation in screen pixels.
    #[must_use]
    pub const fn pan(&self) -> Vec2 {
        self.pan
    }

    /// Maps a map-pixel position to the screen.
    #[must_use]
    pub fn to_screen(&self, map: Vec2) -> Vec2 {
        map * self.zoom + self.pan
    }

    /// Maps a screen position back to map pixels.
    #[must_use]
    pub fn to_map(&self, screen: Vec2) -> Vec2 {
        (screen - self.pan) / self.zoom
    }

    /// Zooms by `factor` keeping the map point under `anchor` fixed on screen.
    #[must_use]
    pub fn zoom_about(&self, anchor: Vec2, factor: f32) -> Self {
        if !factor.is_finite() || factor <= 0.0 {
            return *self;
        }
        let zoom = clamp_zoom(self.zoom * factor);
        let ratio = zoom / self.zoom;
        Self {
            zoom,
            pan: anchor - (anchor - self.pan) * ratio,
        }
    }

    /// Shifts the view by a screen-space offset.
    #[must_use]
    pub fn panned(&self, pan: Vec2) -> Self {
        Self {
            zoom: self.zoom,
            pan,
        }
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_nan() {
        return 1.0;
    }
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// In-progress pointer gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Gesture {
    /// No gesture.
    #[default]
    Idle,
    /// Single-pointer drag.
    Dragging {
        /// Screen position where the drag started.
        origin: Vec2,
        /// Pan at the start of the drag.
        pan_origin: Vec2,
    },
    /// Two-finger pinch.
    Pinching {
        /// Finger distance at the previous pinch update.
        distance: f32,
    },
}

/// Everything the renderer needs to know about the user's view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    /// Primary view.
    pub mode: ViewMode,
    /// Journey element visibility.
    pub filters: EventFilters,
    /// Heatmap parameters.
    pub heatmap: HeatmapSettings,
    /// Map-to-screen transform.
    pub transform: ViewTransform,
    /// Drawing surface size.
    pub viewport: Viewport,
    /// Pointer gesture in progress.
    pub gesture: Gesture,
}

/// User input understood by [`reduce`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewInput {
    /// Switches the primary view.
    SetMode(ViewMode),
    /// Shows or hides a class of journey elements.
    SetFilter {
        /// Element class.
        toggle: FilterToggle,
        /// New visibility.
        visible: bool,
    },
    /// Selects the heatmap event population.
    SetHeatmapMode(HeatmapMode),
    /// Sets the kernel radius in pixels.
    SetKernelRadius(f32),
    /// Sets the intensity slider step.
    SetIntensity(u8),
    /// Toggles the all-matches heatmap scope.
    SetAggregate(bool),
    /// The drawing surface changed size.
    Resize(Viewport),
    /// Fits a map of the given pixel size into the viewport.
    ResetView {
        /// Edge length of the map canvas.
        map_size: u32,
    },
    /// Zooms in about the viewport centre.
    ZoomIn,
    /// Zooms out about the viewport centre.
    ZoomOut,
    /// Mouse wheel notch; negative deltas zoom in.
    Wheel {
        /// Cursor position in screen pixels.
        at: Vec2,
        /// Vertical wheel delta.
        delta_y: f32,
    },
    /// Pointer pressed.
    DragStart(Vec2),
    /// Pointer moved.
    DragMove(Vec2),
    /// Pointer released or left the surface.
    DragEnd,
    /// Two touches moved.
    Pinch {
        /// First touch.
        first: Vec2,
        /// Second touch.
        second: Vec2,
    },
    /// All touches lifted.
    TouchEnd,
}

/// Side effect the host must carry out on the session after a reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewEffect {
    /// Drop the overlay and cancel any overlay aggregation.
    ClearOverlay,
    /// Start pooling every match on the active map.
    RequestPooledEvents,
}

/// Computes the view that results from `input`.
///
/// The function is pure: the previous state is untouched and session-level
/// consequences are reported through `effects`.
#[must_use]
pub fn reduce(state: &ViewState, input: ViewInput, effects: &mut Vec<ViewEffect>) -> ViewState {
    let mut next = state.clone();
    match input {
        ViewInput::SetMode(mode) => {
            if state.mode == ViewMode::Journeys && mode == ViewMode::Heatmap {
                next.filters = EventFilters::default();
                effects.push(ViewEffect::ClearOverlay);
            }
            next.mode = mode;
            if mode == ViewMode::Heatmap && next.heatmap.aggregate {
                effects.push(ViewEffect::RequestPooledEvents);
            }
        }
        ViewInput::SetFilter { toggle, visible } => next.filters.set(toggle, visible),
        ViewInput::SetHeatmapMode(mode) => next.heatmap.params.mode = mode,
        ViewInput::SetKernelRadius(radius) => {
            next.heatmap.params.radius = KernelRadius::new(radius);
        }
        ViewInput::SetIntensity(step) => {
            next.heatmap.params.intensity = Intensity::from_slider(step);
        }
        ViewInput::SetAggregate(aggregate) => {
            next.heatmap.aggregate = aggregate;
            if aggregate && !state.heatmap.aggregate {
                effects.push(ViewEffect::RequestPooledEvents);
            }
        }
        ViewInput::Resize(viewport) => next.viewport = viewport,
        ViewInput::ResetView { map_size } => {
            next.transform = ViewTransform::fit(state.viewport, map_size as f32);
        }
        ViewInput::ZoomIn => {
            next.transform = state
                .transform
                .zoom_about(state.viewport.center(), BUTTON_ZOOM_FACTOR);
        }
        ViewInput::ZoomOut => {
            next.transform = state
                .transform
                .zoom_about(state.viewport.center(), 1.0 / BUTTON_ZOOM_FACTOR);
        }
        ViewInput::Wheel { at, delta_y } => {
            let factor = if delta_y < 0.0 {
                WHEEL_ZOOM_FACTOR
            } else {
                1.0 / WHEEL_ZOOM_FACTOR
            };
            next.transform = state.transform.zoom_about(at, factor);
        }
        ViewInput::DragStart(at) => {
            next.gesture = Gesture::Dragging {
                origin: at,
                pan_origin: state.transform.pan(),
            };
        }
        ViewInput::DragMove(at) => {
            if let Gesture::Dragging { origin, pan_origin } = state.gesture {
                next.transform = state.transform.panned(pan_origin + (at - origin));
            }
        }
        ViewInput::DragEnd => {
            if matches!(state.gesture, Gesture::Dragging { .. }) {
                next.gesture = Gesture::Idle;
            }
        }
        ViewInput::Pinch { first, second } => {
            let distance = first.distance(second);
            if let Gesture::Pinching { distance: previous } = state.gesture {
                if previous > 0.0 {
                    let midpoint = (first + second) / 2.0;
                    next.transform = state.transform.zoom_about(midpoint, distance / previous);
                }
            }
            next.gesture = Gesture::Pinching { distance };
        }
        ViewInput::TouchEnd => next.gesture = Gesture::Idle,
    }
    next
}
