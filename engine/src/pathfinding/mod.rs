//! Pathfinding Module
//!
//! Terrain-aware road routing over a [`HeightField`](crate::terrain::HeightField).

pub mod effort_path;

pub use effort_path::{
    BridgePenalty, BridgeRoll, EffortCost, EffortPathfinder, GridPoint, path_cost, path_length,
};
