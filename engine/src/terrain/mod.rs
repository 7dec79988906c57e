//! Terrain Module
//!
//! Heightmap ingestion and terrain surface construction.
//!
//! - [`height_field`] - normalized grid with clamped bilinear sampling
//! - [`source`] - where heightmaps come from
//! - [`mesh_builder`] - solid + wire surfaces and visualization mode

pub mod height_field;
pub mod mesh_builder;
pub mod source;

pub use height_field::{HeightData, HeightField, HeightmapPayload};
pub use mesh_builder::{TerrainSurfaces, VisualizationMode};
pub use source::{HeightmapSource, JsonFileSource, StaticSource};
