//! Config Module
//!
//! Centralized configuration for the terrain lab: scene, lighting, terrain
//! materials, POI visuals, labels, roads, areas, exports and UI feedback.

pub mod lab_config;

pub use lab_config::{
    AreaConfig, ExportConfig, GridConfig, LabConfig, LabelConfig, LightingConfig, PoiConfig,
    PoiKindConfig, RoadConfig, SceneConfig, TerrainConfig, UiConfig,
};
