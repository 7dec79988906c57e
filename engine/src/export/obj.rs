//! OBJ Export
//!
//! Wavefront OBJ text for every mesh and line in the scene graph, with world
//! transforms applied. Sprites, groups and lights have no geometry and are
//! skipped. Hidden nodes are exported too, so the file always carries both
//! terrain surfaces.

use std::fmt::Write as _;

use glam::Mat3;

use crate::scene::{NodeKind, ResourcePool, SceneGraph, Topology};

/// Serialize the whole graph.
pub fn obj_string(graph: &SceneGraph, resources: &ResourcePool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# terrain_lab export");

    // OBJ indices are global and 1-based
    let mut vertex_offset = 1u32;
    let mut normal_offset = 1u32;

    for id in graph.traverse(graph.root()) {
        let Some(node) = graph.get(id) else { continue };
        let geometry = match node.kind {
            NodeKind::Mesh { geometry, .. } | NodeKind::Line { geometry, .. } => resources.geometry(geometry),
            _ => None,
        };
        let Some(geometry) = geometry else { continue };
        if geometry.positions.is_empty() {
            continue;
        }

        let world = graph.world_matrix(id);
        let _ = writeln!(out, "o {}", sanitize(&node.name));
        for p in &geometry.positions {
            let p = world.transform_point3(*p);
            let _ = writeln!(out, "v {} {} {}", p.x, p.y, p.z);
        }

        let vertex_count = geometry.positions.len() as u32;
        match geometry.topology {
            Topology::Triangles => {
                let has_normals = geometry.normals.len() == geometry.positions.len();
                if has_normals {
                    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
                    for n in &geometry.normals {
                        let n = (normal_matrix * *n).normalize_or_zero();
                        let _ = writeln!(out, "vn {} {} {}", n.x, n.y, n.z);
                    }
                }
                for tri in geometry.indices.chunks_exact(3) {
                    let v = |i: u32| i + vertex_offset;
                    if has_normals {
                        let n = |i: u32| i + normal_offset;
                        let _ = writeln!(
                            out,
                            "f {}//{} {}//{} {}//{}",
                            v(tri[0]),
                            n(tri[0]),
                            v(tri[1]),
                            n(tri[1]),
                            v(tri[2]),
                            n(tri[2])
                        );
                    } else {
                        let _ = writeln!(out, "f {} {} {}", v(tri[0]), v(tri[1]), v(tri[2]));
                    }
                }
                if has_normals {
                    normal_offset += vertex_count;
                }
            }
            Topology::LineStrip => {
                let indices: Vec<String> = geometry.indices.iter().map(|i| (i + vertex_offset).to_string()).collect();
                if indices.len() >= 2 {
                    let _ = writeln!(out, "l {}", indices.join(" "));
                }
            }
            Topology::LineSegments => {
                for pair in geometry.indices.chunks_exact(2) {
                    let _ = writeln!(out, "l {} {}", pair[0] + vertex_offset, pair[1] + vertex_offset);
                }
            }
        }
        vertex_offset += vertex_count;
    }
    out
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name.chars().map(|c| if c.is_whitespace() { '_' } else { c }).collect();
    if cleaned.is_empty() { "object".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    use crate::scene::geometry::box_geometry;
    use crate::scene::{Color, Geometry, Material, Node};

    #[test]
    fn test_mesh_and_line_indices_are_global() {
        let mut graph = SceneGraph::new();
        let mut pool = ResourcePool::new();
        let material = pool.add_material(Material::basic(Color::WHITE));
        let geometry = pool.add_geometry(box_geometry(Vec3::ONE));
        graph.add_to_root(Node::new("my box", NodeKind::Mesh { geometry, material }).at(Vec3::new(10.0, 0.0, 0.0)));
        let line = pool.add_geometry(Geometry::line_strip(vec![Vec3::ZERO, Vec3::X, Vec3::Y]));
        graph.add_to_root(Node::new("road", NodeKind::Line { geometry: line, material }));

        let obj = obj_string(&graph, &pool);
        let box_vertices = pool.geometry(geometry).unwrap().positions.len();

        assert!(obj.contains("o my_box"));
        assert_eq!(obj.lines().filter(|l| l.starts_with("f ")).count(), 12);
        assert_eq!(obj.lines().filter(|l| l.starts_with("v ")).count(), box_vertices + 3);
        let expected = format!("l {} {} {}", box_vertices + 1, box_vertices + 2, box_vertices + 3);
        assert!(obj.lines().any(|l| l == expected), "missing '{expected}'");
        // World transform applied: every box vertex is shifted by +10 in x
        let first_v = obj.lines().find(|l| l.starts_with("v ")).unwrap();
        let x: f32 = first_v.split_whitespace().nth(1).unwrap().parse().unwrap();
        assert!(x >= 9.0);
    }

    #[test]
    fn test_empty_scene() {
        let obj = obj_string(&SceneGraph::new(), &ResourcePool::new());
        assert_eq!(obj.lines().count(), 1);
    }
}
