//! POI Registry
//!
//! Owns the placed points of interest and their scene objects. Each POI
//! has three nodes: the kind-specific marker, a label sprite attached to the
//! marker, and a connector line from marker to label. Removing a POI removes
//! all three and releases their geometries, materials and textures.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::label::{ConnectorStyle, LabelRenderer, LabelStyle};
use crate::config::{LabelConfig, PoiConfig, PoiKindConfig};
use crate::scene::{
    self, Color, Geometry, Material, MaterialKind, Node, NodeId, NodeKind, ResourcePool,
    SceneGraph, geometry,
};
use crate::terrain::HeightField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoiId(pub u32);

/// Marker category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiKind {
    Building,
    Vehicle,
    Air,
}

impl PoiKind {
    /// Parse a kind name; unknown names are treated as [`Air`](Self::Air).
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "building" => Self::Building,
            "vehicle" => Self::Vehicle,
            _ => Self::Air,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Vehicle => "vehicle",
            Self::Air => "air",
        }
    }
}

/// Snapshot of a placed POI.
#[derive(Clone, Debug, PartialEq)]
pub struct Poi {
    pub id: PoiId,
    pub name: String,
    pub kind: PoiKind,
    /// Grid-clamped position
    pub x: f32,
    pub z: f32,
    /// Terrain height under the POI
    pub ground: f32,
    /// Lift of the marker center above `ground`
    pub elevation_offset: f32,
    pub yaw_degrees: f32,
    pub visual: NodeId,
    pub label: NodeId,
    pub connector: NodeId,
}

/// Ordered set of placed POIs.
pub struct PoiRegistry {
    pois: Vec<Poi>,
    next_id: u32,
    config: PoiConfig,
    labels: LabelRenderer,
    style: LabelStyle,
}

impl PoiRegistry {
    pub fn new(config: PoiConfig, label_config: LabelConfig) -> Self {
        Self {
            pois: Vec::new(),
            next_id: 1,
            config,
            labels: LabelRenderer::new(label_config),
            style: LabelStyle::default(),
        }
    }

    fn kind_config(&self, kind: PoiKind) -> &PoiKindConfig {
        match kind {
            PoiKind::Building => &self.config.building,
            PoiKind::Vehicle => &self.config.vehicle,
            PoiKind::Air => &self.config.air,
        }
    }

    /// Place a POI on the terrain and return its snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        graph: &mut SceneGraph,
        pool: &mut ResourcePool,
        field: &HeightField,
        name: &str,
        kind: PoiKind,
        x: f32,
        z: f32,
        yaw_degrees: f32,
    ) -> Poi {
        let (x, z) = field.clamp_xz(x, z);
        let ground = field.sample(x, z);
        let name = if name.trim().is_empty() { "POI" } else { name }.to_string();
        let kind_config = self.kind_config(kind).clone();

        let shape = match kind {
            PoiKind::Building => geometry::box_geometry(kind_config.size),
            PoiKind::Vehicle => geometry::sphere_geometry(kind_config.size.x, 12, 12),
            PoiKind::Air => geometry::tetrahedron_geometry(kind_config.size.x),
        };
        let shape = pool.add_geometry(shape);
        let material = pool.add_material(Material::standard(Color::from_hex(kind_config.color), 0.0, 1.0));

        let mut marker = Node::new(
            format!("poi:{name}"),
            NodeKind::Mesh {
                geometry: shape,
                material,
            },
        )
        .at(Vec3::new(x, ground + kind_config.height_offset, z));
        marker.transform.rotation = Quat::from_rotation_y(yaw_degrees.to_radians());
        let visual = graph.add_to_root(marker);

        let label = self.add_label(graph, pool, visual, &name, kind_config.label_offset);
        let connector = self.add_connector(graph, pool, visual, label);

        let poi = Poi {
            id: PoiId(self.next_id),
            name,
            kind,
            x,
            z,
            ground,
            elevation_offset: kind_config.height_offset,
            yaw_degrees,
            visual,
            label,
            connector,
        };
        self.next_id += 1;
        tracing::info!(
            "Added {} POI '{}' at ({:.1}, {:.1}) ground {:.2}",
            kind.as_str(),
            poi.name,
            x,
            z,
            ground
        );
        self.pois.push(poi.clone());
        poi
    }

    fn add_label(
        &self,
        graph: &mut SceneGraph,
        pool: &mut ResourcePool,
        visual: NodeId,
        name: &str,
        offset: f32,
    ) -> NodeId {
        let image = self.labels.render(name, &self.style);
        let size = image.world_size(self.labels.config().scale);
        let texture = pool.add_texture(image.image);
        let material = pool.add_material(Material::sprite(texture));

        let mut node = Node::new(format!("label:{name}"), NodeKind::Sprite { material })
            .at(Vec3::new(0.0, offset, 0.0));
        node.transform.scale = Vec3::new(size.x, size.y, 1.0);
        graph.add(visual, node)
    }

    fn add_connector(
        &self,
        graph: &mut SceneGraph,
        pool: &mut ResourcePool,
        visual: NodeId,
        label: NodeId,
    ) -> NodeId {
        let from = graph.world_position(visual);
        let to = graph.world_position(label);

        let color = Color::from_hex(self.config.connector_color);
        let mut material = Material::line(color, 1.0).with_opacity(self.config.connector_opacity);
        let geometry = match self.style.connector {
            ConnectorStyle::Solid => Geometry::line_strip(vec![from, to]),
            ConnectorStyle::Dashed => {
                material.kind = MaterialKind::Line {
                    dash: Some((self.config.connector_dash_size, self.config.connector_gap_size)),
                    width: 1.0,
                };
                Geometry::line_segments(vec![from, to])
            }
        };
        let geometry = pool.add_geometry(geometry);
        let material = pool.add_material(material);
        graph.add_to_root(Node::new("connector", NodeKind::Line { geometry, material }))
    }

    /// Remove a POI by id. Unknown ids are ignored.
    pub fn remove(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool, id: PoiId) -> bool {
        match self.index_of(id) {
            Some(index) => self.remove_at(graph, pool, index),
            None => false,
        }
    }

    /// Remove the POI at `index` in registration order. Out-of-range indices
    /// are ignored.
    pub fn remove_at(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool, index: usize) -> bool {
        if index >= self.pois.len() {
            tracing::warn!("Ignoring POI removal at index {} ({} POIs)", index, self.pois.len());
            return false;
        }
        let poi = self.pois.remove(index);
        destroy(graph, pool, &poi);
        tracing::info!("Removed POI '{}'", poi.name);
        true
    }

    /// Remove every POI in registration order.
    pub fn clear(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool) {
        let count = self.pois.len();
        for poi in self.pois.drain(..) {
            destroy(graph, pool, &poi);
        }
        if count > 0 {
            tracing::info!("Cleared {} POIs", count);
        }
    }

    /// Restyle every label and connector. The style also applies to POIs
    /// added afterwards.
    pub fn apply_label_styles(&mut self, graph: &mut SceneGraph, pool: &mut ResourcePool, style: LabelStyle) {
        self.style = style;
        let mut pois = std::mem::take(&mut self.pois);
        for poi in &mut pois {
            self.restyle_label(graph, pool, poi);
            if let Err(err) = scene::remove_and_release(graph, pool, poi.connector) {
                tracing::warn!("Connector of '{}' already gone: {}", poi.name, err);
            }
            poi.connector = self.add_connector(graph, pool, poi.visual, poi.label);
        }
        self.pois = pois;
        tracing::debug!("Applied label style {:?} to {} POIs", self.style, self.pois.len());
    }

    fn restyle_label(&self, graph: &mut SceneGraph, pool: &mut ResourcePool, poi: &Poi) {
        let Some(NodeKind::Sprite { material }) = graph.get(poi.label).map(|n| n.kind) else {
            return;
        };
        let image = self.labels.render(&poi.name, &self.style);
        let size = image.world_size(self.labels.config().scale);
        let texture = pool.add_texture(image.image);

        let old = pool.material_mut(material).and_then(|m| {
            let old = m.map();
            m.kind = MaterialKind::Sprite { map: texture };
            old
        });
        if let Some(old) = old {
            if let Err(err) = pool.dispose_texture(old) {
                tracing::warn!("Old label texture of '{}' already gone: {}", poi.name, err);
            }
        }
        if let Some(node) = graph.get_mut(poi.label) {
            node.transform.scale = Vec3::new(size.x, size.y, 1.0);
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Snapshot in registration order.
    pub fn list(&self) -> Vec<Poi> {
        self.pois.clone()
    }

    pub fn get(&self, id: PoiId) -> Option<&Poi> {
        self.pois.iter().find(|p| p.id == id)
    }

    pub fn get_index(&self, index: usize) -> Option<&Poi> {
        self.pois.get(index)
    }

    pub fn index_of(&self, id: PoiId) -> Option<usize> {
        self.pois.iter().position(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    pub fn style(&self) -> &LabelStyle {
        &self.style
    }
}

/// Remove the marker (with its label) and the connector, releasing resources.
fn destroy(graph: &mut SceneGraph, pool: &mut ResourcePool, poi: &Poi) {
    for node in [poi.connector, poi.visual] {
        match scene::remove_and_release(graph, pool, node) {
            Ok(failures) if failures.is_empty() => {}
            Ok(failures) => tracing::warn!("POI '{}': {} resources failed to release", poi.name, failures.len()),
            Err(err) => tracing::warn!("POI '{}': {}", poi.name, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        graph: SceneGraph,
        pool: ResourcePool,
        field: HeightField,
        registry: PoiRegistry,
    }

    fn fixture() -> Fixture {
        Fixture {
            graph: SceneGraph::new(),
            pool: ResourcePool::new(),
            field: HeightField::from_fn(10, 10, |x, _| x as f32).unwrap(),
            registry: PoiRegistry::new(PoiConfig::default(), LabelConfig::default()),
        }
    }

    fn add(f: &mut Fixture, name: &str, kind: PoiKind, x: f32, z: f32) -> Poi {
        f.registry.add(&mut f.graph, &mut f.pool, &f.field, name, kind, x, z, 0.0)
    }

    #[test]
    fn test_add_clamps_and_samples_ground() {
        let mut f = fixture();
        let poi = add(&mut f, "Depot", PoiKind::Building, 20.0, -4.0);
        assert_eq!((poi.x, poi.z), (9.0, 0.0));
        assert_eq!(poi.ground, 9.0);
        assert_eq!(f.graph.world_position(poi.visual), Vec3::new(9.0, 13.0, 0.0));
        assert_eq!(f.graph.world_position(poi.label), Vec3::new(9.0, 19.5, 0.0));
        assert_eq!(f.graph.get(poi.label).unwrap().parent(), Some(poi.visual));
    }

    #[test]
    fn test_kind_offsets() {
        let mut f = fixture();
        let vehicle = add(&mut f, "Truck", PoiKind::Vehicle, 2.0, 2.0);
        let air = add(&mut f, "Heli", PoiKind::Air, 3.0, 3.0);
        assert_eq!(vehicle.elevation_offset, 1.8);
        assert_eq!(air.elevation_offset, 6.0);
        assert_eq!(f.graph.world_position(air.label).y, 3.0 + 6.0 + 3.0);
    }

    #[test]
    fn test_empty_name_defaults() {
        let mut f = fixture();
        assert_eq!(add(&mut f, "  ", PoiKind::Air, 1.0, 1.0).name, "POI");
    }

    #[test]
    fn test_remove_releases_everything() {
        let mut f = fixture();
        let poi = add(&mut f, "A", PoiKind::Building, 1.0, 1.0);
        assert!(f.pool.counts().total() > 0);

        assert!(f.registry.remove(&mut f.graph, &mut f.pool, poi.id));
        assert_eq!(f.pool.counts().total(), 0);
        assert!(f.graph.is_empty());
        assert!(!f.registry.remove(&mut f.graph, &mut f.pool, poi.id));
    }

    #[test]
    fn test_remove_at_out_of_range_ignored() {
        let mut f = fixture();
        add(&mut f, "A", PoiKind::Building, 1.0, 1.0);
        assert!(!f.registry.remove_at(&mut f.graph, &mut f.pool, 5));
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_clear_and_list_order() {
        let mut f = fixture();
        let a = add(&mut f, "A", PoiKind::Building, 1.0, 1.0);
        let b = add(&mut f, "B", PoiKind::Vehicle, 2.0, 2.0);
        let names: Vec<_> = f.registry.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(f.registry.index_of(b.id), Some(1));
        assert_eq!(f.registry.get(a.id).map(|p| p.kind), Some(PoiKind::Building));

        f.registry.clear(&mut f.graph, &mut f.pool);
        assert!(f.registry.list().is_empty());
        assert!(f.graph.is_empty());
        assert_eq!(f.pool.counts().total(), 0);
    }

    #[test]
    fn test_restyle_rebuilds_labels_without_leaking() {
        let mut f = fixture();
        let a = add(&mut f, "Alpha", PoiKind::Building, 1.0, 1.0);
        add(&mut f, "Beta", PoiKind::Air, 2.0, 2.0);
        let before = f.pool.counts();

        let style = LabelStyle {
            bold: false,
            italic: true,
            connector: ConnectorStyle::Dashed,
            ..LabelStyle::default()
        };
        f.registry.apply_label_styles(&mut f.graph, &mut f.pool, style.clone());
        assert_eq!(f.pool.counts(), before);

        let restyled = f.registry.get(a.id).unwrap();
        assert_ne!(restyled.connector, a.connector);
        assert!(!f.graph.contains(a.connector));
        let NodeKind::Line { material, .. } = f.graph.get(restyled.connector).unwrap().kind else {
            panic!("connector is not a line");
        };
        assert!(matches!(
            f.pool.material(material).unwrap().kind,
            MaterialKind::Line { dash: Some(_), .. }
        ));

        // Later POIs use the current style
        let c = add(&mut f, "Gamma", PoiKind::Vehicle, 3.0, 3.0);
        let NodeKind::Line { material, .. } = f.graph.get(c.connector).unwrap().kind else {
            panic!("connector is not a line");
        };
        assert!(matches!(
            f.pool.material(material).unwrap().kind,
            MaterialKind::Line { dash: Some(_), .. }
        ));
        assert_eq!(f.registry.style(), &style);
    }
}
