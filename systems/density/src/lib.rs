#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Kernel density estimation and perceptual color mapping for heatmaps.
//!
//! Points arrive already projected into map-pixel space. Each point splats a
//! truncated Gaussian into a dense grid sized to the map canvas, the grid is
//! normalised by its maximum, gamma-compressed according to the requested
//! intensity, painted through a mode-specific [`ColorRamp`] and finally
//! clipped by the map image's [`OpacityMask`].

mod field;
mod ramp;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use field::{DensityField, KernelStamp, SIGMA_DIVISOR};
pub use ramp::{sample_color_map, ColorRamp, HeatmapMode, UnknownHeatmapMode};

/// Smallest kernel radius accepted, in pixels.
pub const MIN_KERNEL_RADIUS: f32 = 1.0;
/// Largest kernel radius accepted, in pixels.
pub const MAX_KERNEL_RADIUS: f32 = 64.0;
/// Kernel radius used when none is configured.
pub const DEFAULT_KERNEL_RADIUS: f32 = 20.0;
/// Upper bound on splats per estimate regardless of kernel size.
pub const MAX_SPLAT_POINTS: usize = 2_000_000;
/// Kernel samples one estimate may accumulate. Wide kernels lower the point
/// budget below [`MAX_SPLAT_POINTS`]; larger point sets are thinned evenly.
pub const SPLAT_TAP_BUDGET: usize = 250_000_000;
/// Fraction of the peak density below which cells stay transparent.
pub const VISIBILITY_THRESHOLD: f32 = 0.01;

const ALPHA_SCALE: f32 = 220.0;
const ALPHA_FLOOR: f32 = 20.0;
const ALPHA_CEILING: f32 = 235.0;

/// Kernel radius in pixels, clamped to the supported range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelRadius(f32);

impl KernelRadius {
    /// Creates a radius, clamping it to `MIN_KERNEL_RADIUS..=MAX_KERNEL_RADIUS`.
    ///
    /// Non-finite input falls back to [`DEFAULT_KERNEL_RADIUS`].
    #[must_use]
    pub fn new(radius: f32) -> Self {
        if !radius.is_finite() {
            warn!(radius, "non-finite kernel radius replaced by default");
            return Self::default();
        }
        let clamped = radius.clamp(MIN_KERNEL_RADIUS, MAX_KERNEL_RADIUS);
        if clamped != radius {
            warn!(requested = radius, applied = clamped, "kernel radius clamped");
        }
        Self(clamped)
    }

    /// Radius in pixels.
    #[must_use]
    pub const fn get(self) -> f32 {
        self.0
    }
}

impl Default for KernelRadius {
    fn default() -> Self {
        Self(DEFAULT_KERNEL_RADIUS)
    }
}

/// Contrast intensity in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intensity(f32);

impl Intensity {
    /// Steps exposed by the intensity slider.
    pub const SLIDER_STEPS: u8 = 10;

    /// Creates an intensity from a fraction, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn from_fraction(fraction: f32) -> Self {
        if fraction.is_nan() {
            return Self::default();
        }
        Self(fraction.clamp(0.0, 1.0))
    }

    /// Creates an intensity from a slider position in `1..=10`.
    #[must_use]
    pub fn from_slider(step: u8) -> Self {
        let step = step.clamp(1, Self::SLIDER_STEPS);
        Self(f32::from(step) / f32::from(Self::SLIDER_STEPS))
    }

    /// Fractional intensity.
    #[must_use]
    pub const fn get(self) -> f32 {
        self.0
    }

    /// Gamma exponent applied to normalised density (1.0 down to 0.4).
    #[must_use]
    pub fn gamma(self) -> f32 {
        1.0 - self.0 * 0.6
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self(0.5)
    }
}

/// Opacity channel of the map image, used to clip density to the playable area.
#[derive(Clone, Debug, PartialEq)]
pub struct OpacityMask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl OpacityMask {
    /// Creates a mask from one alpha byte per pixel.
    pub fn from_alpha(width: u32, height: u32, alpha: Vec<u8>) -> Result<Self, DensityError> {
        let expected = width as usize * height as usize;
        if alpha.len() != expected {
            return Err(DensityError::MaskBuffer {
                expected,
                actual: alpha.len(),
            });
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// Creates a mask from an interleaved RGBA buffer, keeping only alpha.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, DensityError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(DensityError::MaskBuffer {
                expected,
                actual: rgba.len(),
            });
        }
        let alpha = rgba.chunks_exact(4).map(|pixel| pixel[3]).collect();
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// Width of the mask in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the mask in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn alpha_at(&self, index: usize) -> u8 {
        self.alpha.get(index).copied().unwrap_or(0)
    }
}

/// Premultiplication-free RGBA image produced by the estimator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHeatmapImage")]
pub struct HeatmapImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[derive(Deserialize)]
struct RawHeatmapImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TryFrom<RawHeatmapImage> for HeatmapImage {
    type Error = DensityError;

    fn try_from(raw: RawHeatmapImage) -> Result<Self, Self::Error> {
        let expected = raw.width as usize * raw.height as usize * 4;
        if !raw.pixels.is_empty() && raw.pixels.len() != expected {
            return Err(DensityError::ImageBuffer {
                expected,
                actual: raw.pixels.len(),
            });
        }
        Ok(Self {
            width: raw.width,
            height: raw.height,
            pixels: raw.pixels,
        })
    }
}

impl HeatmapImage {
    /// Fully transparent image that stores no pixel data.
    #[must_use]
    pub const fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Vec::new(),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns `true` when nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// RGBA value of a pixel; transparent black outside the image or when empty.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if self.pixels.is_empty() || x >= self.width || y >= self.height {
            return [0; 4];
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }

    /// Interleaved RGBA bytes, materialising transparent pixels for empty images.
    #[must_use]
    pub fn into_rgba(self) -> Vec<u8> {
        if self.pixels.is_empty() {
            return vec![0; self.width as usize * self.height as usize * 4];
        }
        self.pixels
    }

    /// Number of pixels with non-zero alpha.
    #[must_use]
    pub fn visible_pixels(&self) -> usize {
        self.pixels
            .chunks_exact(4)
            .filter(|pixel| pixel[3] > 0)
            .count()
    }
}

/// Parameters of one density estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DensityParams {
    /// Kernel radius in pixels.
    pub radius: KernelRadius,
    /// Contrast intensity.
    pub intensity: Intensity,
    /// Event population, which selects the color ramp.
    pub mode: HeatmapMode,
}

/// Turns point sets into colored, masked heatmap images.
#[derive(Clone, Debug)]
pub struct DensityEstimator {
    params: DensityParams,
    stamp: KernelStamp,
}

impl DensityEstimator {
    /// Creates an estimator, precomputing the kernel for the configured radius.
    #[must_use]
    pub fn new(params: DensityParams) -> Self {
        Self {
            stamp: KernelStamp::new(params.radius),
            params,
        }
    }

    /// Parameters the estimator was built with.
    #[must_use]
    pub const fn params(&self) -> &DensityParams {
        &self.params
    }

    /// Accumulates the raw, unnormalised density of `points` on a square canvas.
    #[must_use]
    pub fn accumulate(&self, points: &[Vec2], canvas: u32) -> DensityField {
        let mut field = DensityField::new(canvas, canvas);
        let budget = splat_budget(self.stamp.footprint());
        let stride = splat_stride(points.len(), budget);
        if stride > 1 {
            warn!(
                points = points.len(),
                budget,
                stride,
                "point set exceeds splat budget; thinning evenly"
            );
        }
        for point in points.iter().step_by(stride) {
            field.splat(*point, &self.stamp);
        }
        field
    }

    /// Produces the heatmap image for `points` on a square canvas of `canvas` pixels.
    ///
    /// An empty point set, or one that never touches the canvas, yields an
    /// empty image. A mask whose size differs from the canvas is rejected.
    pub fn estimate(
        &self,
        points: &[Vec2],
        canvas: u32,
        mask: Option<&OpacityMask>,
    ) -> Result<HeatmapImage, DensityError> {
        check_mask(mask, canvas, canvas)?;
        let field = self.accumulate(points, canvas);
        self.colorize(&field, mask)
    }

    /// Normalises, gamma-compresses, colors and masks an accumulated field.
    ///
    /// A mask whose size differs from the field is rejected.
    pub fn colorize(
        &self,
        field: &DensityField,
        mask: Option<&OpacityMask>,
    ) -> Result<HeatmapImage, DensityError> {
        check_mask(mask, field.width(), field.height())?;
        let peak = field.max();
        if peak <= 0.0 {
            return Ok(HeatmapImage::empty(field.width(), field.height()));
        }

        let gamma = self.params.intensity.gamma();
        let threshold = peak * VISIBILITY_THRESHOLD;
        let ramp = self.params.mode.ramp();
        let mut pixels = vec![0u8; field.cells().len() * 4];

        for (index, &density) in field.cells().iter().enumerate() {
            if density < threshold {
                continue;
            }
            let t = (density / peak).powf(gamma);
            let mut alpha = (t * ALPHA_SCALE + ALPHA_FLOOR).min(ALPHA_CEILING).floor() as u8;
            if let Some(mask) = mask {
                alpha = (u16::from(alpha) * u16::from(mask.alpha_at(index)) / 255) as u8;
            }
            if alpha == 0 {
                continue;
            }

            let color = ramp.sample(t);
            let offset = index * 4;
            pixels[offset] = color.red;
            pixels[offset + 1] = color.green;
            pixels[offset + 2] = color.blue;
            pixels[offset + 3] = alpha;
        }

        Ok(HeatmapImage {
            width: field.width(),
            height: field.height(),
            pixels,
        })
    }
}

fn check_mask(mask: Option<&OpacityMask>, width: u32, height: u32) -> Result<(), DensityError> {
    match mask {
        Some(mask) if mask.width != width || mask.height != height => {
            Err(DensityError::MaskSize {
                canvas: width,
                width: mask.width,
                height: mask.height,
            })
        }
        _ => Ok(()),
    }
}

fn splat_budget(footprint: usize) -> usize {
    (SPLAT_TAP_BUDGET / footprint.max(1)).clamp(1, MAX_SPLAT_POINTS)
}

fn splat_stride(points: usize, budget: usize) -> usize {
    if points <= budget {
        1
    } else {
        points.div_ceil(budget)
    }
}

/// Errors raised while preparing a density estimate.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DensityError {
    /// The opacity mask does not cover the canvas exactly.
    #[error("opacity mask is {width}x{height} but the canvas is {canvas}x{canvas}")]
    MaskSize {
        /// Edge length of the canvas.
        canvas: u32,
        /// Mask width.
        width: u32,
        /// Mask height.
        height: u32,
    },
    /// A serialised heatmap image holds the wrong number of pixel bytes.
    #[error("heatmap image buffer holds {actual} bytes, expected {expected}")]
    ImageBuffer {
        /// Required length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },
    /// The buffer handed to a mask constructor has the wrong length.
    #[error("opacity mask buffer holds {actual} bytes, expected {expected}")]
    MaskBuffer {
        /// Required length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },
}
