//! Area Patterns
//!
//! Paints a line or dot pattern inside a square or circle, draped on the
//! terrain once at creation. Every row of a line pattern goes into one
//! line-segment geometry and every dot into one merged mesh, so an area
//! owns at most one geometry and one material under its group node.

use std::f32::consts::TAU;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::AreaConfig;
use crate::scene::{self, Color, Geometry, Material, Node, NodeId, NodeKind, ResourcePool, SceneGraph, Topology, geometry};
use crate::terrain::HeightField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AreaId(pub u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaShape {
    #[default]
    Square,
    Circle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaPattern {
    #[default]
    Lines,
    Dots,
}

/// Area request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaSpec {
    pub name: String,
    pub shape: AreaShape,
    pub pattern: AreaPattern,
    pub x: f32,
    pub z: f32,
    pub size: f32,
}

impl Default for AreaSpec {
    fn default() -> Self {
        Self {
            name: "Area".to_string(),
            shape: AreaShape::Square,
            pattern: AreaPattern::Lines,
            x: 20.0,
            z: 20.0,
            size: 10.0,
        }
    }
}

/// A painted area.
#[derive(Clone, Debug, PartialEq)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub shape: AreaShape,
    pub pattern: AreaPattern,
    pub center: (f32, f32),
    /// Edge length (square) or diameter (circle), at least `min_size`
    pub size: f32,
    pub group: NodeId,
}

/// Inclusive float range `start, start+step, ... <= end`.
fn steps(start: f32, end: f32, step: f32) -> impl Iterator<Item = f32> {
    let count = if step > 0.0 && end >= start {
        ((end - start) / step + 1e-4).floor() as usize + 1
    } else {
        0
    };
    (0..count).map(move |i| start + i as f32 * step)
}

/// Sample points of the pattern (before draping), one `Vec` per row for
/// lines or a single `Vec` of dot centers.
pub fn pattern_points(spec: &AreaSpec, size: f32, config: &AreaConfig) -> Vec<Vec<(f32, f32)>> {
    let half = size / 2.0;
    let (cx, cz) = (spec.x, spec.z);
    match (spec.shape, spec.pattern) {
        (AreaShape::Square, AreaPattern::Lines) => steps(cz - half, cz + half, config.line_spacing)
            .map(|z| {
                steps(cx - half, cx + half, config.line_sample_step)
                    .map(|x| (x, z))
                    .collect()
            })
            .collect(),
        (AreaShape::Square, AreaPattern::Dots) => vec![
            steps(cz - half, cz + half, config.point_spacing)
                .flat_map(|z| steps(cx - half, cx + half, config.point_spacing).map(move |x| (x, z)))
                .collect(),
        ],
        (AreaShape::Circle, AreaPattern::Lines) => steps(-half, half, config.line_spacing)
            .map(|dz| {
                let chord = (half * half - dz * dz).max(0.0).sqrt();
                steps(cx - chord, cx + chord, config.line_sample_step)
                    .map(|x| (x, cz + dz))
                    .collect()
            })
            .collect(),
        (AreaShape::Circle, AreaPattern::Dots) => {
            let ring = half * config.dot_ring_fraction;
            let step = config.dot_angle_step;
            let count = if step > 0.0 { (TAU / step).ceil() as usize } else { 0 };
            vec![
                (0..count)
                    .map(|i| i as f32 * step)
                    .filter(|a| *a < TAU)
                    .map(|a| (cx + a.cos() * ring, cz + a.sin() * ring))
                    .collect(),
            ]
        }
    }
}

/// Areas of one session, in creation order.
pub struct AreaLayer {
    areas: Vec<Area>,
    next_id: u32,
    config: AreaConfig,
}

impl AreaLayer {
    pub fn new(config: AreaConfig) -> Self {
        Self {
            areas: Vec::new(),
            next_id: 1,
            config,
        }
    }

    /// Paint an area on the terrain and return it.
    pub fn add(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool, field: &HeightField, spec: &AreaSpec) -> Area {
        let size = if spec.size.is_finite() {
            spec.size.max(self.config.min_size)
        } else {
            self.config.min_size
        };
        let color = Color::parse_css_or(&self.config.default_color, Color::from_hex(0x00ffaa));
        let lift = self.config.height_offset;
        let drape = |(x, z): (f32, f32)| Vec3::new(x, field.sample(x, z) + lift, z);

        let group = graph.add_to_root(Node::new(format!("area:{}", spec.name), NodeKind::Group));
        let rows = pattern_points(spec, size, &self.config);

        match spec.pattern {
            AreaPattern::Lines => {
                let mut lines = Geometry::new(Topology::LineSegments);
                for row in rows.iter().filter(|r| r.len() >= 2) {
                    let draped: Vec<Vec3> = row.iter().copied().map(&drape).collect();
                    let pairs = draped.windows(2).flat_map(|w| [w[0], w[1]]).collect();
                    lines.merge(&Geometry::line_segments(pairs));
                }
                if !lines.positions.is_empty() {
                    let geometry = pool.add_geometry(lines);
                    let material = pool.add_material(Material::line(color, 1.0).with_opacity(self.config.opacity));
                    graph.add(group, Node::new("area-lines", NodeKind::Line { geometry, material }));
                }
            }
            AreaPattern::Dots => {
                let dot = geometry::sphere_geometry(self.config.dot_radius, 6, 6);
                let mut dots = Geometry::new(Topology::Triangles);
                for center in rows.iter().flatten().copied().map(&drape) {
                    dots.merge(&dot.clone().translated(center));
                }
                if !dots.positions.is_empty() {
                    let geometry = pool.add_geometry(dots);
                    let material = pool.add_material(Material::basic(color));
                    graph.add(group, Node::new("area-dots", NodeKind::Mesh { geometry, material }));
                }
            }
        }

        let area = Area {
            id: AreaId(self.next_id),
            name: spec.name.clone(),
            shape: spec.shape,
            pattern: spec.pattern,
            center: (spec.x, spec.z),
            size,
            group,
        };
        self.next_id += 1;
        tracing::info!(
            "Added {:?}/{:?} area '{}' at ({:.1}, {:.1}) size {:.1}",
            area.shape,
            area.pattern,
            area.name,
            spec.x,
            spec.z,
            size
        );
        self.areas.push(area.clone());
        area
    }

    pub fn clear(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool) {
        for area in self.areas.drain(..) {
            match scene::remove_and_release(graph, pool, area.group) {
                Ok(failures) => {
                    for err in failures {
                        tracing::warn!("Area '{}': {}", area.name, err);
                    }
                }
                Err(err) => tracing::warn!("Area '{}': {}", area.name, err),
            }
        }
    }

    pub fn list(&self) -> Vec<Area> {
        self.areas.clone()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(shape: AreaShape, pattern: AreaPattern, size: f32) -> AreaSpec {
        AreaSpec {
            name: "Zone".to_string(),
            shape,
            pattern,
            x: 10.0,
            z: 10.0,
            size,
        }
    }

    #[test]
    fn test_steps_inclusive() {
        let v: Vec<f32> = steps(0.0, 3.0, 1.5).collect();
        assert_eq!(v, vec![0.0, 1.5, 3.0]);
        assert_eq!(steps(1.0, 0.0, 1.0).count(), 0);
    }

    #[test]
    fn test_square_lines_rows() {
        let config = AreaConfig::default();
        let rows = pattern_points(&spec(AreaShape::Square, AreaPattern::Lines, 6.0), 6.0, &config);
        // z from 7 to 13 every 1.5
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.len() == 7));
    }

    #[test]
    fn test_circle_points_stay_inside() {
        let config = AreaConfig::default();
        for pattern in [AreaPattern::Lines, AreaPattern::Dots] {
            let points = pattern_points(&spec(AreaShape::Circle, pattern, 8.0), 8.0, &config);
            for (x, z) in points.into_iter().flatten() {
                let r = ((x - 10.0).powi(2) + (z - 10.0).powi(2)).sqrt();
                assert!(r <= 4.0 + 1e-3, "({x}, {z}) outside");
            }
        }
    }

    #[test]
    fn test_circle_dots_on_ring() {
        let config = AreaConfig::default();
        let dots = pattern_points(&spec(AreaShape::Circle, AreaPattern::Dots, 10.0), 10.0, &config);
        assert_eq!(dots[0].len(), 53);
        for (x, z) in &dots[0] {
            let r = ((x - 10.0).powi(2) + (z - 10.0).powi(2)).sqrt();
            assert!((r - 3.5).abs() < 1e-3);
        }
    }

    #[test]
    fn test_add_enforces_min_size_and_drapes() {
        let mut graph = SceneGraph::new();
        let mut pool = ResourcePool::new();
        let field = HeightField::flat(30, 30, 2.0).unwrap();
        let mut layer = AreaLayer::new(AreaConfig::default());

        let area = layer.add(&mut graph, &mut pool, &field, &spec(AreaShape::Square, AreaPattern::Lines, 1.0));
        assert_eq!(area.size, 4.0);

        let child = graph.get(area.group).unwrap().children()[0];
        let NodeKind::Line { geometry, .. } = graph.get(child).unwrap().kind else {
            panic!("expected line pattern");
        };
        for p in &pool.geometry(geometry).unwrap().positions {
            assert!((p.y - 2.1).abs() < 1e-5);
        }
        assert_eq!(pool.counts().total(), 2);
    }

    #[test]
    fn test_dots_merge_into_one_mesh() {
        let mut graph = SceneGraph::new();
        let mut pool = ResourcePool::new();
        let field = HeightField::flat(30, 30, 0.0).unwrap();
        let mut layer = AreaLayer::new(AreaConfig::default());

        let area = layer.add(&mut graph, &mut pool, &field, &spec(AreaShape::Square, AreaPattern::Dots, 4.0));
        assert_eq!(graph.get(area.group).unwrap().children().len(), 1);
        assert_eq!(pool.counts().geometries, 1);

        layer.clear(&mut graph, &mut pool);
        assert_eq!(pool.counts().total(), 0);
        assert!(graph.is_empty());
        assert!(layer.is_empty());
    }
}
