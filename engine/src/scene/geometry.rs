//! Primitive Geometry
//!
//! Marker shapes (box, sphere, tetrahedron) and the ground grid helper.
//! All shapes are centered on the origin; placement comes from the node
//! transform.

use std::f32::consts::PI;

use glam::Vec3;

use super::resources::{Geometry, Topology};

/// Axis-aligned box with flat-shaded faces (24 vertices).
pub fn box_geometry(size: Vec3) -> Geometry {
    let h = size * 0.5;
    // (normal, u axis, v axis) per face; corners are n ± u ± v
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut geometry = Geometry::new(Topology::Triangles);
    for (normal, u, v) in faces {
        let base = geometry.positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            geometry.positions.push((normal + u * su + v * sv) * h);
            geometry.normals.push(normal);
        }
        geometry
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    geometry
}

/// UV sphere with smooth normals.
pub fn sphere_geometry(radius: f32, width_segments: u32, height_segments: u32) -> Geometry {
    let ws = width_segments.max(3);
    let hs = height_segments.max(2);
    let mut geometry = Geometry::new(Topology::Triangles);

    for iy in 0..=hs {
        let v = iy as f32 / hs as f32;
        let theta = v * PI;
        for ix in 0..=ws {
            let u = ix as f32 / ws as f32;
            let phi = u * 2.0 * PI;
            let normal = Vec3::new(-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
            geometry.positions.push(normal * radius);
            geometry.normals.push(normal);
        }
    }

    let row = ws + 1;
    for iy in 0..hs {
        for ix in 0..ws {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                geometry.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != hs - 1 {
                geometry.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    geometry
}

/// Regular tetrahedron inscribed in a sphere of `radius`, flat-shaded.
pub fn tetrahedron_geometry(radius: f32) -> Geometry {
    let corners = [
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
    ]
    .map(|c| c.normalize() * radius);
    let faces = [[2, 1, 0], [0, 3, 2], [1, 3, 0], [2, 3, 1]];

    let mut geometry = Geometry::new(Topology::Triangles);
    for face in faces {
        let [mut a, b, mut c] = face.map(|i| corners[i]);
        let mut normal = (b - a).cross(c - a).normalize_or_zero();
        // Wind every face outward
        if normal.dot(a + b + c) < 0.0 {
            std::mem::swap(&mut a, &mut c);
            normal = -normal;
        }
        let base = geometry.positions.len() as u32;
        geometry.positions.extend_from_slice(&[a, b, c]);
        geometry.normals.extend_from_slice(&[normal; 3]);
        geometry.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }
    geometry
}

/// Ground grid on the XZ plane: `(center_lines, grid_lines)` as line segments.
///
/// The two axis lines through the origin are returned separately so they can
/// take the highlight color.
pub fn grid_geometry(size: f32, divisions: u32) -> (Geometry, Geometry) {
    let divisions = divisions.max(1);
    let half = size * 0.5;
    let step = size / divisions as f32;
    let center = divisions / 2;

    let mut center_points = Vec::new();
    let mut grid_points = Vec::new();
    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let target = if divisions % 2 == 0 && i == center {
            &mut center_points
        } else {
            &mut grid_points
        };
        target.extend_from_slice(&[
            Vec3::new(-half, 0.0, k),
            Vec3::new(half, 0.0, k),
            Vec3::new(k, 0.0, -half),
            Vec3::new(k, 0.0, half),
        ]);
    }
    (
        Geometry::line_segments(center_points),
        Geometry::line_segments(grid_points),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outward(geometry: &Geometry) -> bool {
        geometry.indices.chunks_exact(3).all(|t| {
            let [a, b, c] = [t[0], t[1], t[2]].map(|i| geometry.positions[i as usize]);
            (b - a).cross(c - a).dot(a + b + c) > 0.0
        })
    }

    #[test]
    fn test_box_extent_and_winding() {
        let geometry = box_geometry(Vec3::new(3.0, 8.0, 3.0));
        assert_eq!(geometry.vertex_count(), 24);
        assert_eq!(geometry.triangle_count(), 12);
        let max_y = geometry.positions.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert_eq!(max_y, 4.0);
        assert!(outward(&geometry));
    }

    #[test]
    fn test_sphere_vertices_on_radius() {
        let geometry = sphere_geometry(1.8, 12, 12);
        for p in &geometry.positions {
            assert!((p.length() - 1.8).abs() < 1e-4);
        }
        assert!(outward(&geometry));
    }

    #[test]
    fn test_tetrahedron_faces_outward() {
        let geometry = tetrahedron_geometry(2.2);
        assert_eq!(geometry.triangle_count(), 4);
        assert!(outward(&geometry));
    }

    #[test]
    fn test_grid_line_counts() {
        let (center, grid) = grid_geometry(200.0, 20);
        assert_eq!(center.edges().len(), 2);
        assert_eq!(grid.edges().len(), 40);
    }
}
