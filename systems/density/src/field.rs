//! Dense scalar accumulation grid and the truncated Gaussian kernel.

use glam::Vec2;

use crate::KernelRadius;

/// Ratio between the kernel radius and the Gaussian standard deviation.
pub const SIGMA_DIVISOR: f64 = 2.5;

/// Precomputed weights of a truncated Gaussian kernel.
///
/// Every splat reuses the same `exp` evaluations, so accumulating with a stamp
/// is numerically identical to evaluating the kernel per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelStamp {
    reach: i64,
    taps: Vec<KernelTap>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct KernelTap {
    dx: i64,
    dy: i64,
    weight: f32,
}

impl KernelStamp {
    /// Builds the stamp for a kernel of the provided radius.
    ///
    /// The kernel reaches `ceil(radius)` cells and includes every integer offset
    /// whose squared distance does not exceed that reach squared.
    #[must_use]
    pub fn new(radius: KernelRadius) -> Self {
        let sigma = f64::from(radius.get()) / SIGMA_DIVISOR;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let reach = f64::from(radius.get()).ceil() as i64;
        let reach_sq = reach * reach;

        let mut taps = Vec::new();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let d2 = dx * dx + dy * dy;
                if d2 > reach_sq {
                    continue;
                }
                let weight = (-(d2 as f64) / two_sigma_sq).exp() as f32;
                taps.push(KernelTap { dx, dy, weight });
            }
        }

        Self { reach, taps }
    }

    /// Number of cells the kernel extends from its centre along each axis.
    #[must_use]
    pub const fn reach(&self) -> i64 {
        self.reach
    }

    /// Number of cells touched by one unclipped splat.
    #[must_use]
    pub fn footprint(&self) -> usize {
        self.taps.len()
    }
}

/// Dense row-major scalar grid matching the map's pixel canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    width: u32,
    height: u32,
    cells: Vec<f32>,
}

impl DensityField {
    /// Allocates a zero-initialised field.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![0.0; len],
        }
    }

    /// Width of the field in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the field in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw cell values in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// Density accumulated at the provided cell, or `None` outside the grid.
    #[must_use]
    pub fn value(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Adds the kernel centred on the pixel nearest to `center`.
    ///
    /// Contributions sum without clamping; cells falling outside the grid are
    /// skipped, so points beyond the canvas edge still shade the border.
    pub fn splat(&mut self, center: Vec2, stamp: &KernelStamp) {
        if !center.x.is_finite() || !center.y.is_finite() {
            return;
        }

        let cx = nearest_cell(center.x);
        let cy = nearest_cell(center.y);
        let width = i64::from(self.width);
        let height = i64::from(self.height);

        if cx + stamp.reach < 0
            || cy + stamp.reach < 0
            || cx - stamp.reach >= width
            || cy - stamp.reach >= height
        {
            return;
        }

        for tap in &stamp.taps {
            let x = cx + tap.dx;
            let y = cy + tap.dy;
            if x < 0 || y < 0 || x >= width || y >= height {
                continue;
            }
            let index = (y * width + x) as usize;
            self.cells[index] += tap.weight;
        }
    }

    /// Largest accumulated value, `0.0` for an untouched field.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.cells.iter().copied().fold(0.0, f32::max)
    }

    /// Sum of all accumulated values.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.cells.iter().map(|&value| f64::from(value)).sum()
    }
}

// Halves round towards positive infinity.
fn nearest_cell(coordinate: f32) -> i64 {
    (f64::from(coordinate) + 0.5).floor() as i64
}
