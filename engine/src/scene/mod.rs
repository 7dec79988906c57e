//! Scene Module
//!
//! Scene graph, resource ownership, primitive shapes, the orbit camera and
//! the per-frame draw list.
//!
//! Nodes reference resources by id. Removing nodes from the graph does not
//! free anything by itself; callers pass the removed nodes to
//! [`release_nodes`], which disposes each resource independently so one
//! failure never stops the rest of the teardown.

pub mod camera;
pub mod color;
pub mod draw_list;
pub mod geometry;
pub mod graph;
pub mod resources;

pub use camera::LabCamera;
pub use color::Color;
pub use draw_list::{DrawLine, DrawList, DrawSprite, DrawVertex, Lighting};
pub use graph::{Light, Node, NodeId, NodeKind, SceneGraph, Transform};
pub use resources::{
    Geometry, GeometryId, Material, MaterialId, MaterialKind, ResourceCounts, ResourceHandle,
    ResourcePool, Texture, TextureId, Topology,
};

use crate::error::ResourceError;

/// Resources referenced by a node (geometry, material and the material's map).
pub fn node_resources(node: &Node, pool: &ResourcePool) -> Vec<ResourceHandle> {
    let (geometry, material) = match node.kind {
        NodeKind::Mesh { geometry, material } | NodeKind::Line { geometry, material } => {
            (Some(geometry), Some(material))
        }
        NodeKind::Sprite { material } => (None, Some(material)),
        NodeKind::Group | NodeKind::Light(_) => (None, None),
    };

    let mut handles = Vec::new();
    if let Some(g) = geometry {
        handles.push(ResourceHandle::Geometry(g));
    }
    if let Some(m) = material {
        if let Some(t) = pool.material(m).and_then(Material::map) {
            handles.push(ResourceHandle::Texture(t));
        }
        handles.push(ResourceHandle::Material(m));
    }
    handles
}

/// Dispose every resource referenced by `nodes`.
///
/// Each disposal is attempted on its own; failures are logged and collected.
pub fn release_nodes(nodes: &[Node], pool: &mut ResourcePool) -> Vec<ResourceError> {
    let mut failures = Vec::new();
    for node in nodes {
        for handle in node_resources(node, pool) {
            if let Err(err) = pool.dispose(handle) {
                tracing::warn!("Failed to release {:?} of node '{}': {}", handle, node.name, err);
                failures.push(err);
            }
        }
    }
    failures
}

/// Remove `id` (and its subtree) from the graph and release its resources.
pub fn remove_and_release(
    graph: &mut SceneGraph,
    pool: &mut ResourcePool,
    id: NodeId,
) -> Result<Vec<ResourceError>, ResourceError> {
    if !graph.contains(id) {
        return Err(ResourceError::UnknownNode(id.0));
    }
    let removed = graph.remove(id);
    Ok(release_nodes(&removed, pool))
}
