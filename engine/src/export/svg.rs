//! SVG Export
//!
//! Vector re-render of the current view. Faces and lines are projected with
//! the live camera, sorted back to front (painter's algorithm) and written as
//! SVG paths. Faces are flat shaded with the scene lighting; wireframe
//! materials arrive as lines from the draw list and become strokes.
//! Billboard labels are raster-only and do not appear in the SVG.

use std::fmt::Write as _;

use glam::{Vec2, Vec3};

use crate::scene::camera::project_with;
use crate::scene::{Color, DrawList, LabCamera, ResourcePool, SceneGraph};

enum Primitive {
    Face { points: [Vec2; 3], color: Color },
    Stroke { points: [Vec2; 2], color: Color, width: f32 },
}

/// Render `graph` from `camera` into SVG markup sized `width × height`.
pub fn svg_string(
    graph: &SceneGraph,
    resources: &ResourcePool,
    camera: &LabCamera,
    width: u32,
    height: u32,
    background: Color,
) -> String {
    let list = DrawList::build(graph, resources, camera, background);
    svg_from_draw_list(&list, width, height)
}

/// SVG markup for an already built draw list.
pub fn svg_from_draw_list(list: &DrawList, width: u32, height: u32) -> String {
    let width = width.max(1);
    let height = height.max(1);
    let project = |p: Vec3| project_with(&list.view_proj, p, width, height);
    let frame = (Vec2::ZERO, Vec2::new(width as f32, height as f32));

    let mut primitives: Vec<(f32, Primitive)> = Vec::new();

    for tri in list.triangles.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            project(tri[0].position()),
            project(tri[1].position()),
            project(tri[2].position()),
        ) else {
            continue;
        };
        let points = [a.0, b.0, c.0];
        if !overlaps(&points, frame) {
            continue;
        }
        let normal = tri.iter().map(|v| v.normal()).sum::<Vec3>();
        let base = Color::from(tri[0].color);
        let color = if tri.iter().any(|v| v.is_lit()) {
            list.lighting.shade(base, normal.normalize_or_zero())
        } else {
            base
        };
        let depth = (a.1 + b.1 + c.1) / 3.0;
        primitives.push((depth, Primitive::Face { points, color }));
    }

    for line in &list.lines {
        let (Some(a), Some(b)) = (project(line.a), project(line.b)) else {
            continue;
        };
        let points = [a.0, b.0];
        if !overlaps(&points, frame) {
            continue;
        }
        // Lines sit on the surface they are drawn over; nudge them in front
        let depth = (a.1 + b.1) / 2.0 - 1e-4;
        primitives.push((
            depth,
            Primitive::Stroke {
                points,
                color: line.color,
                width: line.width,
            },
        ));
    }

    // Far to near
    primitives.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = writeln!(
        out,
        r#"<rect width="{width}" height="{height}" style="fill:{}"/>"#,
        list.background.to_css_rgb()
    );
    for (_, primitive) in &primitives {
        match primitive {
            Primitive::Face { points, color } => {
                let _ = writeln!(
                    out,
                    r#"<path d="M{:.2},{:.2}L{:.2},{:.2}L{:.2},{:.2}Z" style="fill:{};fill-opacity:{:.3};stroke:{};stroke-opacity:{:.3};stroke-width:0.5"/>"#,
                    points[0].x,
                    points[0].y,
                    points[1].x,
                    points[1].y,
                    points[2].x,
                    points[2].y,
                    color.to_css_rgb(),
                    color.a,
                    color.to_css_rgb(),
                    color.a,
                );
            }
            Primitive::Stroke { points, color, width } => {
                let _ = writeln!(
                    out,
                    r#"<path d="M{:.2},{:.2}L{:.2},{:.2}" style="fill:none;stroke:{};stroke-opacity:{:.3};stroke-width:{}"/>"#,
                    points[0].x,
                    points[0].y,
                    points[1].x,
                    points[1].y,
                    color.to_css_rgb(),
                    color.a,
                    width,
                );
            }
        }
    }
    out.push_str("</svg>\n");
    out
}

/// Bounding box of `points` intersects the frame.
fn overlaps(points: &[Vec2], (min, max): (Vec2, Vec2)) -> bool {
    let lo = points.iter().fold(Vec2::splat(f32::INFINITY), |acc, p| acc.min(*p));
    let hi = points.iter().fold(Vec2::splat(f32::NEG_INFINITY), |acc, p| acc.max(*p));
    lo.x <= max.x && lo.y <= max.y && hi.x >= min.x && hi.y >= min.y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::scene::geometry::box_geometry;
    use crate::scene::{Geometry, Material, Node, NodeKind};

    fn camera() -> LabCamera {
        let mut camera = LabCamera::from_config(&SceneConfig::default(), 1.0);
        camera.set_position(Vec3::new(0.0, 10.0, 10.0));
        camera
    }

    #[test]
    fn test_faces_and_strokes() {
        let mut graph = SceneGraph::new();
        let mut pool = ResourcePool::new();
        let geometry = pool.add_geometry(box_geometry(Vec3::ONE));
        let material = pool.add_material(Material::basic(Color::from_hex(0x00ff00)));
        graph.add_to_root(Node::new("box", NodeKind::Mesh { geometry, material }));
        let line = pool.add_geometry(Geometry::line_strip(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]));
        let line_material = pool.add_material(Material::line(Color::WHITE, 1.0));
        graph.add_to_root(Node::new("line", NodeKind::Line { geometry: line, material: line_material }));

        let svg = svg_string(&graph, &pool, &camera(), 200, 100, Color::BLACK);
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"width="200" height="100""#));
        assert_eq!(svg.matches("fill:rgb(0,255,0)").count(), 12);
        assert!(svg.contains("fill:none;stroke:rgb(255,255,255)"));
    }

    #[test]
    fn test_hidden_material_is_absent() {
        let mut graph = SceneGraph::new();
        let mut pool = ResourcePool::new();
        let geometry = pool.add_geometry(box_geometry(Vec3::ONE));
        let mut material = Material::basic(Color::from_hex(0x00ff00));
        material.visible = false;
        let material = pool.add_material(material);
        graph.add_to_root(Node::new("box", NodeKind::Mesh { geometry, material }));

        let svg = svg_string(&graph, &pool, &camera(), 64, 64, Color::BLACK);
        assert!(!svg.contains("rgb(0,255,0)"));
    }

    #[test]
    fn test_overlaps() {
        let frame = (Vec2::ZERO, Vec2::new(10.0, 10.0));
        assert!(overlaps(&[Vec2::new(-5.0, 5.0), Vec2::new(5.0, 5.0)], frame));
        assert!(!overlaps(&[Vec2::new(11.0, 0.0), Vec2::new(20.0, 5.0)], frame));
    }
}
