//! Overlay Module
//!
//! Objects draped on the terrain: roads between buildings and patterned areas.

pub mod area;
pub mod road;

pub use area::{Area, AreaId, AreaLayer, AreaPattern, AreaShape, AreaSpec};
pub use road::{Road, RoadId, RoadNetwork, RoadStyle, RoadStyleSpec};
