//! Raster Export
//!
//! PNG snapshot of the frame the renderer last drew.

use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::error::ExportError;
use crate::render::RenderBackend;

/// Read back the current frame.
pub fn capture(backend: &mut dyn RenderBackend) -> Result<RgbaImage, ExportError> {
    Ok(backend.capture_frame()?)
}

/// Encode `image` as PNG at `path`.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
