//! Roads
//!
//! Roads connect two Building POIs along an effort path. The path is
//! draped on the terrain with a small lift and drawn as one line strip.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::RoadConfig;
use crate::error::RoadError;
use crate::pathfinding::{EffortPathfinder, GridPoint, path_length};
use crate::poi::{PoiId, PoiKind, PoiRegistry};
use crate::scene::{self, Color, Geometry, Material, MaterialKind, Node, NodeId, NodeKind, ResourcePool, SceneGraph};
use crate::terrain::HeightField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoadId(pub u32);

/// Requested road style; missing fields take the configured defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadStyleSpec {
    pub color: Option<String>,
    pub width: Option<f32>,
    pub opacity: Option<f32>,
}

/// Normalized road style.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoadStyle {
    pub color: Color,
    /// At least 1
    pub width: f32,
    /// Within `[0.05, 1]`
    pub opacity: f32,
}

impl RoadStyle {
    pub fn resolve(spec: &RoadStyleSpec, config: &RoadConfig) -> Self {
        let fallback = Color::parse_css_or(&config.default_color, Color::from_hex(0xff7825));
        let color = spec
            .color
            .as_deref()
            .map_or(fallback, |c| Color::parse_css_or(c, fallback));
        let width = spec.width.filter(|w| w.is_finite()).unwrap_or(config.default_width);
        let opacity = spec
            .opacity
            .filter(|o| o.is_finite())
            .unwrap_or(config.default_opacity);
        Self {
            color,
            width: width.max(1.0),
            opacity: opacity.clamp(0.05, 1.0),
        }
    }
}

/// A built road.
#[derive(Clone, Debug, PartialEq)]
pub struct Road {
    pub id: RoadId,
    pub endpoint_a: PoiId,
    pub endpoint_b: PoiId,
    pub path: Vec<GridPoint>,
    pub style: RoadStyle,
    pub line: NodeId,
}

/// Roads of one session, in creation order.
pub struct RoadNetwork {
    roads: Vec<Road>,
    next_id: u32,
    config: RoadConfig,
    pathfinder: EffortPathfinder,
}

impl RoadNetwork {
    pub fn new(config: RoadConfig) -> Self {
        Self {
            pathfinder: EffortPathfinder::from_config(&config),
            roads: Vec::new(),
            next_id: 1,
            config,
        }
    }

    /// Replace the pathfinder (e.g. to fix the bridge seed).
    pub fn with_pathfinder(mut self, pathfinder: EffortPathfinder) -> Self {
        self.pathfinder = pathfinder;
        self
    }

    /// Build a road between the POIs at registry indices `from` and `to`.
    ///
    /// Both must exist, differ, and be Buildings; otherwise nothing is
    /// created.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        graph: &mut SceneGraph,
        pool: &mut ResourcePool,
        field: Option<&HeightField>,
        pois: &PoiRegistry,
        from: usize,
        to: usize,
        style: &RoadStyleSpec,
    ) -> Result<Road, RoadError> {
        let field = field.ok_or(RoadError::NoTerrain)?;
        let a = pois.get_index(from).ok_or(RoadError::UnknownPoi(from))?;
        let b = pois.get_index(to).ok_or(RoadError::UnknownPoi(to))?;
        if a.id == b.id {
            return Err(RoadError::SameEndpoint);
        }
        for poi in [a, b] {
            if poi.kind != PoiKind::Building {
                return Err(RoadError::NotBuilding(poi.name.clone(), poi.kind.as_str()));
            }
        }

        let path = self.pathfinder.find_effort_path(field, (a.x, a.z), (b.x, b.z));
        let style = RoadStyle::resolve(style, &self.config);

        let points = path
            .iter()
            .map(|&(x, z)| {
                let (x, z) = (x as f32, z as f32);
                Vec3::new(x, field.sample(x, z) + self.config.height_offset, z)
            })
            .collect();
        let geometry = pool.add_geometry(Geometry::line_strip(points));
        let mut material = Material::line(style.color, 1.0).with_opacity(style.opacity);
        material.kind = MaterialKind::Line {
            dash: None,
            width: style.width,
        };
        let material = pool.add_material(material);
        let line = graph.add_to_root(Node::new(
            format!("road:{}-{}", a.name, b.name),
            NodeKind::Line { geometry, material },
        ));

        let road = Road {
            id: RoadId(self.next_id),
            endpoint_a: a.id,
            endpoint_b: b.id,
            path,
            style,
            line,
        };
        self.next_id += 1;
        tracing::info!(
            "Built road '{}' -> '{}': {} points, length {:.1}",
            a.name,
            b.name,
            road.path.len(),
            path_length(&road.path)
        );
        self.roads.push(road.clone());
        Ok(road)
    }

    /// Remove one road and release its line.
    pub fn remove(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool, id: RoadId) -> bool {
        let Some(index) = self.roads.iter().position(|r| r.id == id) else {
            return false;
        };
        let road = self.roads.remove(index);
        release(graph, pool, &road);
        true
    }

    pub fn clear(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool) {
        for road in self.roads.drain(..) {
            release(graph, pool, &road);
        }
    }

    pub fn list(&self) -> Vec<Road> {
        self.roads.clone()
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }
}

fn release(graph: &mut SceneGraph, pool: &mut ResourcePool, road: &Road) {
    match scene::remove_and_release(graph, pool, road.line) {
        Ok(failures) => {
            for err in failures {
                tracing::warn!("Road {:?}: {}", road.id, err);
            }
        }
        Err(err) => tracing::warn!("Road {:?}: {}", road.id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LabelConfig, PoiConfig};
    use crate::pathfinding::{BridgeRoll, EffortCost};

    struct Fixture {
        graph: SceneGraph,
        pool: ResourcePool,
        field: HeightField,
        pois: PoiRegistry,
        roads: RoadNetwork,
    }

    fn fixture() -> Fixture {
        let mut f = Fixture {
            graph: SceneGraph::new(),
            pool: ResourcePool::new(),
            field: HeightField::flat(8, 8, 1.0).unwrap(),
            pois: PoiRegistry::new(PoiConfig::default(), LabelConfig::default()),
            roads: RoadNetwork::new(RoadConfig::default())
                .with_pathfinder(EffortPathfinder::new(EffortCost::default(), BridgeRoll::Disabled)),
        };
        f.pois.add(&mut f.graph, &mut f.pool, &f.field, "A", PoiKind::Building, 0.0, 0.0, 0.0);
        f.pois.add(&mut f.graph, &mut f.pool, &f.field, "B", PoiKind::Building, 5.0, 0.0, 0.0);
        f.pois.add(&mut f.graph, &mut f.pool, &f.field, "Car", PoiKind::Vehicle, 3.0, 3.0, 0.0);
        f
    }

    fn build(f: &mut Fixture, from: usize, to: usize) -> Result<Road, RoadError> {
        f.roads.build(&mut f.graph, &mut f.pool, Some(&f.field), &f.pois, from, to, &RoadStyleSpec::default())
    }

    #[test]
    fn test_road_between_buildings() {
        let mut f = fixture();
        let road = build(&mut f, 0, 1).unwrap();
        assert_eq!(road.path, vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]);
        let NodeKind::Line { geometry, .. } = f.graph.get(road.line).unwrap().kind else {
            panic!("road is not a line");
        };
        let lifted = f.pool.geometry(geometry).unwrap().positions[0];
        assert!((lifted.y - 1.3).abs() < 1e-6);
        assert_eq!(f.roads.len(), 1);
    }

    #[test]
    fn test_non_building_endpoint_rejected() {
        let mut f = fixture();
        let counts = f.pool.counts();
        let err = build(&mut f, 0, 2).unwrap_err();
        assert_eq!(err, RoadError::NotBuilding("Car".to_string(), "vehicle"));
        assert!(f.roads.is_empty());
        assert_eq!(f.pois.len(), 3);
        assert_eq!(f.pool.counts(), counts);
    }

    #[test]
    fn test_bad_indices_rejected() {
        let mut f = fixture();
        assert_eq!(build(&mut f, 0, 9).unwrap_err(), RoadError::UnknownPoi(9));
        assert_eq!(build(&mut f, 1, 1).unwrap_err(), RoadError::SameEndpoint);
        let err = f
            .roads
            .build(&mut f.graph, &mut f.pool, None, &f.pois, 0, 1, &RoadStyleSpec::default())
            .unwrap_err();
        assert_eq!(err, RoadError::NoTerrain);
    }

    #[test]
    fn test_style_normalization() {
        let config = RoadConfig::default();
        let style = RoadStyle::resolve(
            &RoadStyleSpec {
                color: Some("#00ff00".to_string()),
                width: Some(0.2),
                opacity: Some(0.0),
            },
            &config,
        );
        assert_eq!(style.color.to_rgba8(), [0, 255, 0, 255]);
        assert_eq!(style.width, 1.0);
        assert_eq!(style.opacity, 0.05);

        let fallback = RoadStyle::resolve(
            &RoadStyleSpec {
                color: Some("???".to_string()),
                ..RoadStyleSpec::default()
            },
            &config,
        );
        assert_eq!(fallback.color.to_rgba8(), [0xff, 0x78, 0x25, 0xff]);
        assert_eq!(fallback.opacity, 0.9);
        assert_eq!(fallback.width, 2.0);
    }

    #[test]
    fn test_remove_single_road() {
        let mut f = fixture();
        let first = build(&mut f, 0, 1).unwrap();
        let second = build(&mut f, 1, 0).unwrap();

        assert!(f.roads.remove(&mut f.graph, &mut f.pool, first.id));
        assert!(!f.graph.contains(first.line));
        assert!(f.graph.contains(second.line));
        assert_eq!(f.roads.list().iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id]);
        assert!(!f.roads.remove(&mut f.graph, &mut f.pool, first.id));
    }

    #[test]
    fn test_clear_releases_lines() {
        let mut f = fixture();
        let before = f.pool.counts();
        build(&mut f, 0, 1).unwrap();
        build(&mut f, 1, 0).unwrap();
        f.roads.clear(&mut f.graph, &mut f.pool);
        assert!(f.roads.is_empty());
        assert_eq!(f.pool.counts(), before);
    }
}
