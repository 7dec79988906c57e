//! Terrain Lab Engine
//!
//! A headless-capable 3D terrain lab: renders a heightmap as a scene, places
//! points of interest with billboard labels, routes roads between buildings
//! along slope-aware effort paths, paints patterned areas on the surface,
//! and exports the result as PNG, OBJ or SVG.
//!
//! # Modules
//!
//! - [`session`] - lab lifecycle, host surface, command channel, feedback
//! - [`terrain`] - heightmap validation, sampling and surface meshes
//! - [`pathfinding`] - A* effort paths over a height field
//! - [`poi`] - POI registry and label textures
//! - [`overlay`] - roads and area patterns draped on the terrain
//! - [`scene`] - scene graph, resources, camera, draw list
//! - [`render`] - wgpu and software backends behind a provider chain
//! - [`export`] - PNG, OBJ and SVG exporters
//! - [`config`] - TOML configuration
//!
//! # Example
//!
//! ```ignore
//! use terrain_lab_engine::config::LabConfig;
//! use terrain_lab_engine::poi::PoiKind;
//! use terrain_lab_engine::render::CapabilityLoader;
//! use terrain_lab_engine::session::{HeadlessHost, LabSession};
//! use terrain_lab_engine::terrain::JsonFileSource;
//!
//! let mut session = LabSession::new(LabConfig::default(), HeadlessHost::new(1280, 720));
//! session.enter(&mut CapabilityLoader::default())?;
//! session.load_terrain(&JsonFileSource::new("heightmap.json"));
//! session.add_poi("HQ", PoiKind::Building, 10.0, 12.0, 0.0);
//! session.add_poi("Depot", PoiKind::Building, 40.0, 30.0, 0.0);
//! session.build_road(0, 1, &Default::default());
//! session.render_frame();
//! session.dispose();
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod overlay;
pub mod pathfinding;
pub mod poi;
pub mod render;
pub mod scene;
pub mod session;
pub mod terrain;

pub use config::LabConfig;
pub use error::LabError;
pub use session::{HeadlessHost, LabSession, SessionCommand, SessionState};
