//! Render Providers
//!
//! A provider is one way of obtaining a render backend. The loader walks an
//! ordered chain of providers and keeps the first one that works, so later
//! loads in the same process skip straight to it.

use crate::error::{LabError, ProviderError};

use super::backend::{RenderBackend, RenderCapability};
use super::gpu::{GpuBackend, GpuBackendConfig};
use super::software::SoftwareBackend;

/// One attempt at creating a backend.
pub trait RenderProvider {
    fn name(&self) -> &str;

    fn load(&self, width: u32, height: u32) -> Result<Box<dyn RenderBackend>, ProviderError>;
}

/// wgpu on a hardware (or, with `force_fallback_adapter`, fallback) adapter.
pub struct GpuProvider {
    name: &'static str,
    config: GpuBackendConfig,
}

impl GpuProvider {
    pub fn hardware() -> Self {
        Self {
            name: "gpu",
            config: GpuBackendConfig::default(),
        }
    }

    pub fn fallback_adapter() -> Self {
        Self {
            name: "gpu-fallback",
            config: GpuBackendConfig {
                force_fallback_adapter: true,
                ..GpuBackendConfig::default()
            },
        }
    }
}

impl RenderProvider for GpuProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn load(&self, width: u32, height: u32) -> Result<Box<dyn RenderBackend>, ProviderError> {
        let backend = GpuBackend::new(width, height, &self.config)?;
        Ok(Box::new(backend))
    }
}

/// CPU rasterizer. Always available.
pub struct SoftwareProvider;

impl RenderProvider for SoftwareProvider {
    fn name(&self) -> &str {
        "software"
    }

    fn load(&self, width: u32, height: u32) -> Result<Box<dyn RenderBackend>, ProviderError> {
        Ok(Box::new(SoftwareBackend::new(width, height)))
    }
}

/// Ordered provider chain with first-success caching.
pub struct CapabilityLoader {
    providers: Vec<Box<dyn RenderProvider>>,
    cached: Option<usize>,
}

impl Default for CapabilityLoader {
    /// `gpu`, then `gpu-fallback`, then `software`.
    fn default() -> Self {
        Self::new(vec![
            Box::new(GpuProvider::hardware()),
            Box::new(GpuProvider::fallback_adapter()),
            Box::new(SoftwareProvider),
        ])
    }
}

impl CapabilityLoader {
    pub fn new(providers: Vec<Box<dyn RenderProvider>>) -> Self {
        Self {
            providers,
            cached: None,
        }
    }

    /// Software rasterizer only.
    pub fn software_only() -> Self {
        Self::new(vec![Box::new(SoftwareProvider)])
    }

    /// Provider names in attempt order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Name of the provider that succeeded first, if any.
    pub fn cached_provider(&self) -> Option<&str> {
        self.cached.and_then(|i| self.providers.get(i)).map(|p| p.name())
    }

    /// Load a backend, trying the cached provider first and then the chain in
    /// order. Fails with every attempt listed when nothing works.
    pub fn load(&mut self, width: u32, height: u32) -> Result<RenderCapability, LabError> {
        let order: Vec<usize> = self
            .cached
            .into_iter()
            .chain((0..self.providers.len()).filter(|&i| Some(i) != self.cached))
            .collect();

        let mut attempts = Vec::new();
        for index in order {
            let provider = &self.providers[index];
            match provider.load(width, height) {
                Ok(backend) => {
                    tracing::info!("Render capability loaded from '{}' ({})", provider.name(), backend.name());
                    let capability = RenderCapability {
                        backend,
                        provider: provider.name().to_string(),
                    };
                    self.cached = Some(index);
                    return Ok(capability);
                }
                Err(err) => {
                    tracing::warn!("Render provider '{}' failed: {}", provider.name(), err);
                    attempts.push((provider.name().to_string(), err));
                }
            }
        }

        self.cached = None;
        Err(LabError::NoRenderCapability { attempts })
    }
}
