//! Error Types
//!
//! One error enum per concern, plus the session-level [`LabError`] that the
//! host sees. Rejected preconditions and disposal failures are logged by the
//! session and never propagate into the render loop.

use std::path::PathBuf;

/// Heightmap fetch or validation failure (recoverable: the lab keeps running
/// without terrain).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HeightmapError {
    #[error("no heightmap available")]
    Missing,

    #[error("heightmap z data is empty")]
    Empty,

    #[error("malformed heightmap: {0}")]
    Malformed(String),

    #[error("heightmap fetch failed: {0}")]
    Fetch(String),
}

/// A single render provider failed to produce a backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("no adapter available: {0}")]
    NoAdapter(String),

    #[error("device request failed: {0}")]
    Device(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Backend failure while rendering or reading back a frame.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("no frame has been rendered yet")]
    NoFrame,

    #[error("frame readback failed: {0}")]
    Readback(String),

    #[error("renderer already disposed")]
    Disposed,
}

/// Releasing a scene resource failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("geometry {0} is not live")]
    UnknownGeometry(u32),

    #[error("material {0} is not live")]
    UnknownMaterial(u32),

    #[error("texture {0} is not live")]
    UnknownTexture(u32),

    #[error("scene node {0} is not live")]
    UnknownNode(u32),
}

/// A road request that violated its preconditions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoadError {
    #[error("unknown POI index {0}")]
    UnknownPoi(usize),

    #[error("road endpoints must be two different POIs")]
    SameEndpoint,

    #[error("roads can only connect Building POIs ({0} is {1})")]
    NotBuilding(String, &'static str),

    #[error("no terrain loaded")]
    NoTerrain,
}

/// Export failure.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no render capability loaded")]
    NoCapability,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration load failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session-level errors surfaced to the host.
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    /// Every provider in the fallback chain failed.
    #[error("no render capability ({})", format_attempts(.attempts))]
    NoRenderCapability { attempts: Vec<(String, ProviderError)> },

    #[error("session is {0}, operation needs {1}")]
    InvalidState(&'static str, &'static str),

    #[error(transparent)]
    Heightmap(#[from] HeightmapError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn format_attempts(attempts: &[(String, ProviderError)]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_string();
    }
    attempts
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}
