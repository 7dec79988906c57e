//! Lab Configuration
//!
//! Single source of truth for every tunable constant in the lab. Every field
//! has a default, so a TOML file only needs the keys it overrides:
//!
//! ```toml
//! [road]
//! slope_penalty_exponent = 2.0
//! bridge_probability = 0.0
//!
//! [poi.building]
//! color = 0x336699
//! ```
//!
//! Besides typed access, [`LabConfig::lookup`] resolves dotted paths such as
//! `"poi.air.height_offset"` so loosely coupled code can read a value with a
//! safe default.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

// ============================================================================
// SECTIONS
// ============================================================================

/// Camera and background settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Clear color (0xRRGGBB)
    pub background_color: u32,
    /// Vertical field of view in degrees
    pub camera_fov: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    /// Initial camera position; the camera looks at the origin
    pub camera_position: Vec3,
    /// Orbit damping factor applied each frame (0 = no motion, 1 = no damping)
    pub damping_factor: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background_color: 0x000000,
            camera_fov: 55.0,
            camera_near: 0.1,
            camera_far: 2000.0,
            camera_position: Vec3::new(80.0, 120.0, 120.0),
            damping_factor: 0.05,
        }
    }
}

/// Directional + ambient light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub directional_color: u32,
    pub directional_intensity: f32,
    /// Light position; the light shines from here toward the origin
    pub directional_position: Vec3,
    pub ambient_color: u32,
    pub ambient_intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            directional_color: 0xffffff,
            directional_intensity: 0.8,
            directional_position: Vec3::new(1.0, 2.0, 1.0),
            ambient_color: 0xffffff,
            ambient_intensity: 0.2,
        }
    }
}

/// Ground grid helper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: f32,
    pub divisions: u32,
    pub color_center_line: u32,
    pub color_grid: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 200.0,
            divisions: 20,
            color_center_line: 0x00ffff,
            color_grid: 0x003333,
        }
    }
}

/// Terrain surface materials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub color: u32,
    pub metalness: f32,
    pub roughness: f32,
    pub wireframe_color: u32,
    pub wireframe_opacity: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            color: 0x444444,
            metalness: 0.1,
            roughness: 0.9,
            wireframe_color: 0xff7825,
            wireframe_opacity: 0.2,
        }
    }
}

/// Visual parameters for one POI kind.
///
/// `size` is the box extent for buildings and the radius for vehicles and
/// aircraft. `height_offset` lifts the marker's center above the ground.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoiKindConfig {
    pub size: Vec3,
    pub color: u32,
    pub label_offset: f32,
    pub height_offset: f32,
}

impl PoiKindConfig {
    pub fn building() -> Self {
        Self {
            size: Vec3::new(3.0, 8.0, 3.0),
            color: 0x99ccff,
            label_offset: 6.5,
            height_offset: 4.0,
        }
    }

    pub fn vehicle() -> Self {
        Self {
            size: Vec3::splat(1.8),
            color: 0xffee88,
            label_offset: 3.0,
            height_offset: 1.8,
        }
    }

    pub fn air() -> Self {
        Self {
            size: Vec3::splat(2.2),
            color: 0xff8888,
            label_offset: 3.0,
            height_offset: 6.0,
        }
    }
}

/// Keys present in one `[poi.<kind>]` table.
#[derive(Deserialize)]
struct PoiKindOverrides {
    size: Option<Vec3>,
    color: Option<u32>,
    label_offset: Option<f32>,
    height_offset: Option<f32>,
}

impl PoiKindOverrides {
    fn apply(self, base: PoiKindConfig) -> PoiKindConfig {
        PoiKindConfig {
            size: self.size.unwrap_or(base.size),
            color: self.color.unwrap_or(base.color),
            label_offset: self.label_offset.unwrap_or(base.label_offset),
            height_offset: self.height_offset.unwrap_or(base.height_offset),
        }
    }
}

/// Missing keys fall back to the defaults of the kind being read.
fn kind_over<'de, D: Deserializer<'de>>(deserializer: D, base: PoiKindConfig) -> Result<PoiKindConfig, D::Error> {
    PoiKindOverrides::deserialize(deserializer).map(|overrides| overrides.apply(base))
}

fn building_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PoiKindConfig, D::Error> {
    kind_over(deserializer, PoiKindConfig::building())
}

fn vehicle_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PoiKindConfig, D::Error> {
    kind_over(deserializer, PoiKindConfig::vehicle())
}

fn air_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PoiKindConfig, D::Error> {
    kind_over(deserializer, PoiKindConfig::air())
}

/// Per-kind POI visuals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiConfig {
    #[serde(deserialize_with = "building_kind")]
    pub building: PoiKindConfig,
    #[serde(deserialize_with = "vehicle_kind")]
    pub vehicle: PoiKindConfig,
    #[serde(deserialize_with = "air_kind")]
    pub air: PoiKindConfig,
    /// Connector line color and opacity
    pub connector_color: u32,
    pub connector_opacity: f32,
    pub connector_dash_size: f32,
    pub connector_gap_size: f32,
}

impl Default for PoiConfig {
    fn default() -> Self {
        Self {
            building: PoiKindConfig::building(),
            vehicle: PoiKindConfig::vehicle(),
            air: PoiKindConfig::air(),
            connector_color: 0xffffff,
            connector_opacity: 0.7,
            connector_dash_size: 2.0,
            connector_gap_size: 1.0,
        }
    }
}

/// Label rasterization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Bitmap font pixel scale (one font pixel = this many texels)
    pub font_scale: u32,
    /// Height of one text line in texels
    pub line_height: u32,
    pub padding: u32,
    pub background_color: String,
    pub text_color: String,
    /// World units per texel of the label sprite
    pub scale: f32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            font_scale: 4,
            line_height: 36,
            padding: 8,
            background_color: "rgba(0,0,0,0.5)".to_string(),
            text_color: "#fff".to_string(),
            scale: 0.15,
        }
    }
}

/// Road synthesis and pathfinding cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Lift above the terrain to avoid z-fighting
    pub height_offset: f32,
    pub default_color: String,
    pub default_width: f32,
    pub default_opacity: f32,
    pub bridge_probability: f64,
    pub bridge_cost: f64,
    pub slope_penalty_exponent: f64,
    pub slope_penalty_multiplier: f64,
    /// Fixed seed for the bridge penalty; `None` draws from entropy
    pub bridge_seed: Option<u64>,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            height_offset: 0.3,
            default_color: "#ff7825".to_string(),
            default_width: 2.0,
            default_opacity: 0.9,
            bridge_probability: 0.03,
            bridge_cost: 5.0,
            slope_penalty_exponent: 2.2,
            slope_penalty_multiplier: 6.0,
            bridge_seed: None,
        }
    }
}

/// Area pattern spacing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    pub default_color: String,
    /// Distance between pattern rows
    pub line_spacing: f32,
    /// Sample step along a pattern row
    pub line_sample_step: f32,
    /// Grid step between dots
    pub point_spacing: f32,
    pub dot_radius: f32,
    /// Angular step for circular dot rings (radians)
    pub dot_angle_step: f32,
    /// Fraction of the radius at which circular dots are placed
    pub dot_ring_fraction: f32,
    pub opacity: f32,
    pub height_offset: f32,
    pub min_size: f32,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            default_color: "#00ffaa".to_string(),
            line_spacing: 1.5,
            line_sample_step: 1.0,
            point_spacing: 2.0,
            dot_radius: 0.25,
            dot_angle_step: 0.12,
            dot_ring_fraction: 0.7,
            opacity: 0.6,
            height_offset: 0.1,
            min_size: 4.0,
        }
    }
}

/// Export file names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub png_filename: String,
    pub obj_filename: String,
    pub svg_filename: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            png_filename: "terrain_lab.png".to_string(),
            obj_filename: "terrain_lab.obj".to_string(),
            svg_filename: "terrain_lab.svg".to_string(),
        }
    }
}

/// Toast durations (milliseconds).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub toast_duration: u64,
    pub toast_duration_error: u64,
    pub toast_duration_success: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            toast_duration: 3000,
            toast_duration_error: 5000,
            toast_duration_success: 2000,
        }
    }
}

// ============================================================================
// LAB CONFIG
// ============================================================================

/// Complete lab configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub scene: SceneConfig,
    pub lighting: LightingConfig,
    pub grid: GridConfig,
    pub terrain: TerrainConfig,
    pub poi: PoiConfig,
    pub label: LabelConfig,
    pub road: RoadConfig,
    pub area: AreaConfig,
    pub export: ExportConfig,
    pub ui: UiConfig,
}

impl LabConfig {
    /// Parse a (possibly partial) TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve a dotted path (`"road.slope_penalty_exponent"`).
    ///
    /// Returns `None` for unknown paths.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(root, |node, key| match node {
                Value::Object(mut map) => map.remove(key),
                Value::Array(mut items) => {
                    let index: usize = key.parse().ok()?;
                    if index < items.len() {
                        Some(items.swap_remove(index))
                    } else {
                        None
                    }
                }
                _ => None,
            })
    }

    /// Numeric lookup with a default for missing or non-numeric values.
    pub fn get_f32(&self, path: &str, default: f32) -> f32 {
        self.lookup(path)
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .unwrap_or(default)
    }

    /// String lookup with a default for missing or non-string values.
    pub fn get_str(&self, path: &str, default: &str) -> String {
        self.lookup(path)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_lab_constants() {
        let config = LabConfig::default();
        assert_eq!(config.scene.camera_fov, 55.0);
        assert_eq!(config.road.slope_penalty_multiplier, 6.0);
        assert_eq!(config.road.slope_penalty_exponent, 2.2);
        assert_eq!(config.road.bridge_probability, 0.03);
        assert_eq!(config.area.min_size, 4.0);
        assert_eq!(config.poi.building.label_offset, 6.5);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = LabConfig::from_toml_str(
            r#"
            [road]
            bridge_probability = 0.0
            bridge_seed = 7

            [poi.building]
            color = 0x336699
            "#,
        )
        .unwrap();

        assert_eq!(config.road.bridge_probability, 0.0);
        assert_eq!(config.road.bridge_seed, Some(7));
        assert_eq!(config.road.slope_penalty_exponent, 2.2);
        assert_eq!(config.poi.building.color, 0x336699);
        assert_eq!(config.poi.building.label_offset, 6.5);
        assert_eq!(config.grid.divisions, 20);
    }

    #[test]
    fn test_poi_kind_override_keeps_kind_defaults() {
        let config = LabConfig::from_toml_str(
            r#"
            [poi.building]
            color = 0x336699

            [poi.air]
            height_offset = 9.0
            "#,
        )
        .unwrap();

        let building = &config.poi.building;
        assert_eq!(building.color, 0x336699);
        assert_eq!(building.size, Vec3::new(3.0, 8.0, 3.0));
        assert_eq!(building.height_offset, 4.0);
        assert_eq!(building.label_offset, 6.5);

        assert_eq!(config.poi.air.height_offset, 9.0);
        assert_eq!(config.poi.air.size, Vec3::splat(2.2));
        assert_eq!(config.poi.air.color, 0xff8888);
        assert_eq!(config.poi.vehicle, PoiKindConfig::vehicle());
    }

    #[test]
    fn test_poi_kind_size_from_array() {
        let config = LabConfig::from_toml_str("[poi.vehicle]\nsize = [1.0, 2.0, 3.0]").unwrap();
        assert_eq!(config.poi.vehicle.size, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(config.poi.vehicle.label_offset, 3.0);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(LabConfig::from_toml_str("[road\nx=").is_err());
    }

    #[test]
    fn test_lookup_paths() {
        let config = LabConfig::default();
        assert_eq!(config.get_f32("road.slope_penalty_exponent", 0.0), 2.2);
        assert_eq!(config.get_f32("poi.air.height_offset", 0.0), 6.0);
        assert_eq!(config.get_f32("scene.camera_position.1", 0.0), 120.0);
        assert_eq!(config.get_str("export.svg_filename", ""), "terrain_lab.svg");
    }

    #[test]
    fn test_lookup_falls_back_to_default() {
        let config = LabConfig::default();
        assert!(config.lookup("road.does_not_exist").is_none());
        assert_eq!(config.get_f32("road.does_not_exist", 1.5), 1.5);
        assert_eq!(config.get_f32("label.text_color", 9.0), 9.0);
        assert_eq!(config.get_str("nope.nope", "fallback"), "fallback");
    }
}
