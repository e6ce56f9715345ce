//! Per-map calibration and the world-to-pixel coordinate mapper.

use std::collections::BTreeMap;

use glam::Vec2;
use thiserror::Error;

use crate::{MapId, WorldPoint};

/// Edge length, in pixels, of the square canvas every shipped minimap is authored in.
pub const DEFAULT_PIXEL_SIZE: u32 = 1024;

/// Largest accepted canvas edge. Density fields allocate one `f32` per canvas
/// pixel, so this caps a single field at 256 MiB.
pub const MAX_PIXEL_SIZE: u32 = 8192;

/// Calibration describing how world coordinates land on a map image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapCalibration {
    scale: f64,
    origin_x: f64,
    origin_z: f64,
    pixel_size: u32,
}

impl MapCalibration {
    /// Creates a calibration after validating its invariants.
    ///
    /// Returns an error when `scale` is not a positive finite number or the
    /// pixel canvas is empty or larger than [`MAX_PIXEL_SIZE`].
    pub fn new(
        scale: f64,
        origin_x: f64,
        origin_z: f64,
        pixel_size: u32,
    ) -> Result<Self, CalibrationError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CalibrationError::NonPositiveScale { scale });
        }
        if pixel_size == 0 {
            return Err(CalibrationError::EmptyCanvas);
        }
        if pixel_size > MAX_PIXEL_SIZE {
            return Err(CalibrationError::OversizedCanvas { pixel_size });
        }

        Ok(Self {
            scale,
            origin_x,
            origin_z,
            pixel_size,
        })
    }

    /// World units covered by the full width of the map image.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// World-space x coordinate of the map's left edge.
    #[must_use]
    pub const fn origin_x(&self) -> f64 {
        self.origin_x
    }

    /// World-space z coordinate of the map's bottom edge.
    #[must_use]
    pub const fn origin_z(&self) -> f64 {
        self.origin_z
    }

    /// Edge length of the square pixel canvas.
    #[must_use]
    pub const fn pixel_size(&self) -> u32 {
        self.pixel_size
    }

    /// Converts a world-space sample into map-pixel space.
    ///
    /// The vertical axis is flipped because world z grows northwards while
    /// pixel rows grow downwards. No clamping is applied.
    #[must_use]
    pub fn world_to_pixel(&self, x: f64, z: f64) -> Vec2 {
        let size = f64::from(self.pixel_size);
        let u = (x - self.origin_x) / self.scale;
        let v = (z - self.origin_z) / self.scale;
        Vec2::new((u * size) as f32, ((1.0 - v) * size) as f32)
    }

    /// Converts a map-pixel position back into world space.
    #[must_use]
    pub fn pixel_to_world(&self, pixel: Vec2) -> WorldPoint {
        let size = f64::from(self.pixel_size);
        let u = f64::from(pixel.x) / size;
        let v = 1.0 - f64::from(pixel.y) / size;
        WorldPoint::new(
            u * self.scale + self.origin_x,
            v * self.scale + self.origin_z,
        )
    }
}

/// Converts a world-space sample into map-pixel space using the provided calibration.
#[must_use]
pub fn world_to_pixel(x: f64, z: f64, calibration: &MapCalibration) -> Vec2 {
    calibration.world_to_pixel(x, z)
}

/// Calibration plus the minimap asset associated with a map.
#[derive(Clone, Debug, PartialEq)]
pub struct MapDefinition {
    /// Coordinate calibration for the map.
    pub calibration: MapCalibration,
    /// Path of the minimap image, relative to the asset root.
    pub image: Option<String>,
}

/// Immutable lookup of calibrations keyed by map identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationTable {
    maps: BTreeMap<MapId, MapDefinition>,
}

impl CalibrationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table describing the maps shipped with the recorded data set.
    #[must_use]
    pub fn builtin() -> Self {
        let shipped = [
            (
                "AmbroseValley",
                900.0,
                -370.0,
                -473.0,
                "minimaps/AmbroseValley_Minimap.png",
            ),
            (
                "GrandRift",
                581.0,
                -290.0,
                -290.0,
                "minimaps/GrandRift_Minimap.png",
            ),
            (
                "Lockdown",
                1000.0,
                -500.0,
                -500.0,
                "minimaps/Lockdown_Minimap.jpg",
            ),
        ];

        let mut table = Self::new();
        for (name, scale, origin_x, origin_z, image) in shipped {
            let calibration = MapCalibration {
                scale,
                origin_x,
                origin_z,
                pixel_size: DEFAULT_PIXEL_SIZE,
            };
            let _ = table.insert(
                MapId::new(name),
                MapDefinition {
                    calibration,
                    image: Some(image.to_owned()),
                },
            );
        }
        table
    }

    /// Registers a map, returning the definition it replaced, if any.
    pub fn insert(&mut self, map: MapId, definition: MapDefinition) -> Option<MapDefinition> {
        self.maps.insert(map, definition)
    }

    /// Looks up the calibration for a map.
    ///
    /// Unknown maps are a configuration error and are reported rather than defaulted.
    pub fn calibration(&self, map: &MapId) -> Result<&MapCalibration, CalibrationError> {
        self.definition(map).map(|definition| &definition.calibration)
    }

    /// Looks up the full definition for a map.
    pub fn definition(&self, map: &MapId) -> Result<&MapDefinition, CalibrationError> {
        self.maps
            .get(map)
            .ok_or_else(|| CalibrationError::UnknownMap { map: map.clone() })
    }

    /// Iterates over the registered maps in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&MapId, &MapDefinition)> {
        self.maps.iter()
    }

    /// Number of registered maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Returns `true` when no map is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// Errors raised while building or consulting calibrations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CalibrationError {
    /// The world-to-map scale must be a positive finite number.
    #[error("map scale must be positive (received {scale})")]
    NonPositiveScale {
        /// Scale that failed validation.
        scale: f64,
    },
    /// The pixel canvas must have a non-zero size.
    #[error("map pixel size must be positive")]
    EmptyCanvas,
    /// The pixel canvas exceeds [`MAX_PIXEL_SIZE`].
    #[error("map pixel size {pixel_size} exceeds the {MAX_PIXEL_SIZE} pixel limit")]
    OversizedCanvas {
        /// Pixel size that failed validation.
        pixel_size: u32,
    },
    /// No calibration is registered for the requested map.
    #[error("no calibration registered for map `{map}`")]
    UnknownMap {
        /// Map that was requested.
        map: MapId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambrose() -> MapCalibration {
        MapCalibration::new(900.0, -370.0, -473.0, DEFAULT_PIXEL_SIZE).expect("valid calibration")
    }

    #[test]
    fn origin_maps_to_bottom_left_corner() {
        let pixel = ambrose().world_to_pixel(-370.0, -473.0);

        assert_eq!(pixel, Vec2::new(0.0, 1024.0));
    }

    #[test]
    fn far_corner_maps_to_top_right() {
        let pixel = ambrose().world_to_pixel(-370.0 + 900.0, -473.0 + 900.0);

        assert!((pixel.x - 1024.0).abs() < 1e-3);
        assert!(pixel.y.abs() < 1e-3);
    }

    #[test]
    fn world_to_pixel_round_trips_through_inverse() {
        let calibration = ambrose();
        let samples = [
            (0.0, 0.0),
            (-370.0, -473.0),
            (125.5, -12.25),
            (2_000.0, -3_000.0),
            (-1_234.5, 987.0),
        ];

        for (x, z) in samples {
            let pixel = world_to_pixel(x, z, &calibration);
            let back = calibration.pixel_to_world(pixel);
            assert!((back.x - x).abs() < 1e-2, "x diverged for ({x}, {z}): {back:?}");
            assert!((back.z - z).abs() < 1e-2, "z diverged for ({x}, {z}): {back:?}");
        }
    }

    #[test]
    fn off_canvas_points_are_not_clamped() {
        let pixel = ambrose().world_to_pixel(-5_000.0, 5_000.0);

        assert!(pixel.x < 0.0);
        assert!(pixel.y < 0.0);
    }

    #[test]
    fn rejects_non_positive_scale() {
        assert_eq!(
            MapCalibration::new(0.0, 0.0, 0.0, 1024),
            Err(CalibrationError::NonPositiveScale { scale: 0.0 })
        );
        assert_eq!(
            MapCalibration::new(10.0, 0.0, 0.0, 0),
            Err(CalibrationError::EmptyCanvas)
        );
    }

    #[test]
    fn rejects_canvases_beyond_the_size_limit() {
        assert!(MapCalibration::new(10.0, 0.0, 0.0, MAX_PIXEL_SIZE).is_ok());
        assert_eq!(
            MapCalibration::new(10.0, 0.0, 0.0, MAX_PIXEL_SIZE + 1),
            Err(CalibrationError::OversizedCanvas {
                pixel_size: MAX_PIXEL_SIZE + 1
            })
        );
    }

    #[test]
    fn unknown_map_lookup_is_an_error() {
        let table = CalibrationTable::builtin();

        assert_eq!(table.len(), 3);
        assert!(table.calibration(&MapId::new("GrandRift")).is_ok());
        assert_eq!(
            table.calibration(&MapId::new("Atlantis")),
            Err(CalibrationError::UnknownMap {
                map: MapId::new("Atlantis")
            })
        );
    }
}
