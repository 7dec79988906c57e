//! POI Module
//!
//! Points of interest placed on the terrain and their billboard labels.

pub mod label;
pub mod registry;

pub use label::{ConnectorStyle, LabelImage, LabelRenderer, LabelStyle};
pub use registry::{Poi, PoiId, PoiKind, PoiRegistry};
