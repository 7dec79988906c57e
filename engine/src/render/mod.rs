//! Render Module
//!
//! Offscreen renderers behind the [`RenderBackend`] trait and the provider
//! chain that picks one at session start: a wgpu backend on a hardware or
//! fallback adapter, and a CPU rasterizer when no adapter exists.

pub mod backend;
pub mod gpu;
pub mod provider;
pub mod software;

pub use backend::{RenderBackend, RenderCapability};
pub use gpu::{GpuBackend, GpuBackendConfig};
pub use provider::{CapabilityLoader, GpuProvider, RenderProvider, SoftwareProvider};
pub use software::SoftwareBackend;
