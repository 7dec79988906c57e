//! Export Module
//!
//! PNG, OBJ and SVG exports of the live scene. Each export writes the file
//! name configured under `[export]` into a target directory.

pub mod obj;
pub mod raster;
pub mod svg;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::render::RenderBackend;
use crate::scene::{Color, LabCamera, ResourcePool, SceneGraph};

pub use obj::obj_string;
pub use svg::{svg_from_draw_list, svg_string};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Png,
    Obj,
    Svg,
}

impl ExportKind {
    pub const ALL: [ExportKind; 3] = [ExportKind::Png, ExportKind::Obj, ExportKind::Svg];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "obj" => Some(Self::Obj),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }
}

/// Everything an export reads from the session.
pub struct ExportScene<'a> {
    pub graph: &'a SceneGraph,
    pub resources: &'a ResourcePool,
    pub camera: &'a LabCamera,
    pub viewport: (u32, u32),
    pub background: Color,
    pub backend: Option<&'a mut dyn RenderBackend>,
}

pub struct ExportPipeline {
    config: ExportConfig,
}

impl ExportPipeline {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn file_name(&self, kind: ExportKind) -> &str {
        match kind {
            ExportKind::Png => &self.config.png_filename,
            ExportKind::Obj => &self.config.obj_filename,
            ExportKind::Svg => &self.config.svg_filename,
        }
    }

    /// Write one export into `dir` and return the file path.
    pub fn export(&self, kind: ExportKind, scene: ExportScene<'_>, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(self.file_name(kind));
        match kind {
            ExportKind::Png => {
                let backend = scene.backend.ok_or(ExportError::NoCapability)?;
                let image = raster::capture(backend)?;
                raster::write_png(&image, &path)?;
            }
            ExportKind::Obj => {
                write_text(&path, &obj_string(scene.graph, scene.resources))?;
            }
            ExportKind::Svg => {
                let (width, height) = scene.viewport;
                let markup = svg_string(scene.graph, scene.resources, scene.camera, width, height, scene.background);
                write_text(&path, &markup)?;
            }
        }
        tracing::info!("Exported {:?} to {}", kind, path.display());
        Ok(path)
    }
}

fn write_text(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
