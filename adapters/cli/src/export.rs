use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use image::{
    imageops::{self, FilterType},
    RgbaImage,
};
use match_atlas_rendering::{DrawCommand, DrawingSurface, ViewTransform};
use match_atlas_system_density::{HeatmapImage, OpacityMask};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct Frame {
    transform: ViewTransform,
    commands: Vec<Value>,
}

/// Drawing surface that writes each frame as a JSON document.
pub(crate) struct JsonSurface<W> {
    writer: W,
    frame: Option<Frame>,
}

impl<W: Write> JsonSurface<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            writer,
            frame: None,
        }
    }
}

impl<W: Write> DrawingSurface for JsonSurface<W> {
    fn begin(&mut self, transform: &ViewTransform) -> Result<()> {
        self.frame = Some(Frame {
            transform: *transform,
            commands: Vec::new(),
        });
        Ok(())
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<()> {
        let frame = self
            .frame
            .as_mut()
            .context("draw command issued outside of a frame")?;
        frame
            .commands
            .push(serde_json::to_value(command).context("failed to encode draw command")?);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let frame = self
            .frame
            .take()
            .context("frame finished before it began")?;
        serde_json::to_writer_pretty(&mut self.writer, &frame)
            .context("failed to write draw list")?;
        writeln!(self.writer).context("failed to write draw list")?;
        self.writer.flush().context("failed to flush draw list")
    }
}

/// Writes a heatmap image as PNG.
pub(crate) fn write_png(image: HeatmapImage, path: &Path) -> Result<()> {
    let (width, height) = (image.width(), image.height());
    let buffer = RgbaImage::from_raw(width, height, image.into_rgba())
        .context("heatmap pixel buffer does not match its dimensions")?;
    buffer
        .save(path)
        .with_context(|| format!("failed to write heatmap to {}", path.display()))
}

/// Loads an image's opacity channel as a mask scaled to a square canvas.
pub(crate) fn load_mask(path: &Path, canvas: u32) -> Result<OpacityMask> {
    let mut pixels = image::open(path)
        .with_context(|| format!("failed to read mask image at {}", path.display()))?
        .to_rgba8();
    if pixels.dimensions() != (canvas, canvas) {
        pixels = imageops::resize(&pixels, canvas, canvas, FilterType::Triangle);
    }
    let mask = OpacityMask::from_rgba(canvas, canvas, pixels.as_raw())
        .with_context(|| format!("mask image at {} is unusable", path.display()))?;
    Ok(mask)
}
