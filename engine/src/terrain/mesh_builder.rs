//! Terrain Mesh Builder
//!
//! Turns a [`HeightField`] into two surfaces sharing one vertex topology:
//! a lit solid mesh and a translucent wireframe overlay attached as its
//! child. Grid coordinates map directly to world XZ, so vertex `(x, z)`
//! sits at `(x, h(x, z), z)`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::height_field::HeightField;
use crate::config::TerrainConfig;
use crate::error::ResourceError;
use crate::scene::{
    self, Color, Geometry, GeometryId, Material, MaterialId, Node, NodeId, NodeKind,
    ResourcePool, SceneGraph, Topology,
};

/// Which terrain surface is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationMode {
    /// Shaded solid surface
    #[default]
    Mesh,
    /// Wire overlay only
    Contours,
}

impl VisualizationMode {
    /// Parse a mode name; anything other than `"contours"` means [`Mesh`](Self::Mesh).
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("contours") {
            Self::Contours
        } else {
            Self::Mesh
        }
    }
}

/// Scene handles of a built terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainSurfaces {
    pub solid: NodeId,
    pub wire: NodeId,
    pub solid_geometry: GeometryId,
    pub solid_material: MaterialId,
    pub wire_geometry: GeometryId,
    pub wire_material: MaterialId,
}

/// Grid geometry with heights and smooth normals.
pub fn terrain_geometry(field: &HeightField) -> Geometry {
    let (w, h) = (field.width(), field.height());
    let mut geometry = Geometry::new(Topology::Triangles);
    geometry.positions.reserve(w * h);

    for z in 0..h {
        for x in 0..w {
            geometry
                .positions
                .push(Vec3::new(x as f32, field.at(x, z), z as f32));
        }
    }

    let w32 = w as u32;
    for z in 0..h.saturating_sub(1) as u32 {
        for x in 0..w.saturating_sub(1) as u32 {
            let a = z * w32 + x;
            let b = (z + 1) * w32 + x;
            let c = (z + 1) * w32 + x + 1;
            let d = z * w32 + x + 1;
            geometry.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    geometry.compute_vertex_normals();
    geometry
}

/// Build both surfaces and attach them under the scene root.
pub fn build(
    field: &HeightField,
    config: &TerrainConfig,
    graph: &mut SceneGraph,
    pool: &mut ResourcePool,
) -> TerrainSurfaces {
    let geometry = terrain_geometry(field);
    let triangles = geometry.triangle_count();

    let solid_geometry = pool.add_geometry(geometry.clone());
    let solid_material = pool.add_material(Material::standard(
        Color::from_hex(config.color),
        config.metalness,
        config.roughness,
    ));
    let wire_geometry = pool.add_geometry(geometry);
    let wire_material = pool.add_material(
        Material::basic(Color::from_hex(config.wireframe_color))
            .with_wireframe(true)
            .with_opacity(config.wireframe_opacity),
    );

    let solid = graph.add_to_root(Node::new(
        "Terrain",
        NodeKind::Mesh {
            geometry: solid_geometry,
            material: solid_material,
        },
    ));
    let wire = graph.add(
        solid,
        Node::new(
            "TerrainWire",
            NodeKind::Mesh {
                geometry: wire_geometry,
                material: wire_material,
            },
        ),
    );

    tracing::info!(
        "Built terrain mesh {}x{} ({} triangles)",
        field.width(),
        field.height(),
        triangles
    );

    TerrainSurfaces {
        solid,
        wire,
        solid_geometry,
        solid_material,
        wire_geometry,
        wire_material,
    }
}

/// Remove both surfaces and release their geometries and materials.
pub fn dispose(
    surfaces: &TerrainSurfaces,
    graph: &mut SceneGraph,
    pool: &mut ResourcePool,
) -> Vec<ResourceError> {
    match scene::remove_and_release(graph, pool, surfaces.solid) {
        Ok(failures) => failures,
        Err(err) => vec![err],
    }
}

/// Release `previous` (if any), then build the new surfaces.
pub fn replace(
    previous: Option<TerrainSurfaces>,
    field: &HeightField,
    config: &TerrainConfig,
    graph: &mut SceneGraph,
    pool: &mut ResourcePool,
) -> TerrainSurfaces {
    if let Some(previous) = previous {
        for err in dispose(&previous, graph, pool) {
            tracing::warn!("Terrain release failed: {}", err);
        }
    }
    build(field, config, graph, pool)
}

/// Show the solid surface or the wire overlay. Geometry is untouched.
///
/// The overlay is a child of the solid node, so the solid surface is hidden
/// through its material rather than its node.
pub fn apply_mode(
    surfaces: &TerrainSurfaces,
    mode: VisualizationMode,
    graph: &mut SceneGraph,
    pool: &mut ResourcePool,
) {
    let contours = mode == VisualizationMode::Contours;
    if let Some(material) = pool.material_mut(surfaces.solid_material) {
        material.wireframe = false;
        material.visible = !contours;
    }
    if let Some(node) = graph.get_mut(surfaces.wire) {
        node.visible = contours;
    }
}
