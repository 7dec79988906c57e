//! Render Backend
//!
//! The seam between the session and whatever turns a `DrawList` into pixels.

use image::RgbaImage;

use crate::error::RenderError;
use crate::scene::{DrawList, ResourceHandle, ResourcePool};

/// A renderer that draws into an offscreen frame buffer.
pub trait RenderBackend {
    /// Short backend name for logs ("wgpu", "software").
    fn name(&self) -> &str;

    /// Resize the frame buffer. Zero sizes are clamped to 1.
    fn resize(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Draw one frame. Textures referenced by sprites are looked up in `resources`.
    fn render(&mut self, list: &DrawList, resources: &ResourcePool) -> Result<(), RenderError>;

    /// Copy of the last rendered frame.
    fn capture_frame(&mut self) -> Result<RgbaImage, RenderError>;

    /// Drop any backend-side copy of a released resource.
    fn release(&mut self, handle: ResourceHandle);

    /// Release every backend resource. Later calls return `RenderError::Disposed`.
    fn dispose(&mut self);
}

/// A loaded rendering capability and the provider that produced it.
pub struct RenderCapability {
    pub backend: Box<dyn RenderBackend>,
    pub provider: String,
}

impl std::fmt::Debug for RenderCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCapability")
            .field("backend", &self.backend.name())
            .field("provider", &self.provider)
            .finish()
    }
}
