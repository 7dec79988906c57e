//! Scene Resources
//!
//! Geometries, materials and textures live in a [`ResourcePool`] and are
//! referenced from scene nodes by id. Every resource has an explicit
//! lifetime: it stays live until disposed, and disposal is recorded so the
//! active render backend can drop whatever it cached for that id.

use std::collections::BTreeMap;

use glam::Vec3;
use image::RgbaImage;

use super::color::Color;
use crate::error::ResourceError;

// ============================================================================
// IDS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeometryId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

/// Any disposable resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    Geometry(GeometryId),
    Material(MaterialId),
    Texture(TextureId),
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// How the index buffer of a geometry is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Three indices per triangle
    Triangles,
    /// Consecutive points connected into one polyline
    LineStrip,
    /// Independent pairs of points
    LineSegments,
}

/// Vertex data in object space.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl Geometry {
    pub fn new(topology: Topology) -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            indices: Vec::new(),
            topology,
        }
    }

    /// Polyline through `points`, indices `0..n`.
    pub fn line_strip(points: Vec<Vec3>) -> Self {
        let indices = (0..points.len() as u32).collect();
        Self {
            normals: Vec::new(),
            positions: points,
            indices,
            topology: Topology::LineStrip,
        }
    }

    /// Independent segments from consecutive point pairs.
    pub fn line_segments(points: Vec<Vec3>) -> Self {
        let indices = (0..points.len() as u32).collect();
        Self {
            normals: Vec::new(),
            positions: points,
            indices,
            topology: Topology::LineSegments,
        }
    }

    /// Append another geometry of the same topology, rebasing its indices.
    pub fn merge(&mut self, other: &Geometry) {
        let base_idx = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + base_idx));
    }

    /// Offset every position (used to bake per-instance placement).
    pub fn translated(mut self, offset: Vec3) -> Self {
        for p in &mut self.positions {
            *p += offset;
        }
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles => self.indices.len() / 3,
            _ => 0,
        }
    }

    /// Index pairs of every line segment this geometry draws.
    ///
    /// For triangle geometry these are the triangle edges (wireframe).
    pub fn edges(&self) -> Vec<(u32, u32)> {
        match self.topology {
            Topology::LineStrip => self.indices.windows(2).map(|w| (w[0], w[1])).collect(),
            Topology::LineSegments => self.indices.chunks_exact(2).map(|w| (w[0], w[1])).collect(),
            Topology::Triangles => self
                .indices
                .chunks_exact(3)
                .flat_map(|t| [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])])
                .collect(),
        }
    }

    /// Recompute smooth per-vertex normals from area-weighted face normals.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        if self.topology == Topology::Triangles {
            for tri in self.indices.chunks_exact(3) {
                let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
                let face = (self.positions[b] - self.positions[a])
                    .cross(self.positions[c] - self.positions[a]);
                normals[a] += face;
                normals[b] += face;
                normals[c] += face;
            }
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
            .collect();
    }
}

// ============================================================================
// MATERIAL
// ============================================================================

/// Shading model of a material.
#[derive(Clone, Debug, PartialEq)]
pub enum MaterialKind {
    /// Lit surface
    Standard { metalness: f32, roughness: f32 },
    /// Unlit surface
    Basic,
    /// Line material; `dash` is `(dash_size, gap_size)` for dashed lines
    Line { dash: Option<(f32, f32)>, width: f32 },
    /// Billboard sprite sampling `map`
    Sprite { map: TextureId },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    /// Draw triangle edges instead of filled faces
    pub wireframe: bool,
    /// Hidden materials are skipped by renderers while their node stays in the graph
    pub visible: bool,
}

impl Material {
    pub fn standard(color: Color, metalness: f32, roughness: f32) -> Self {
        Self {
            kind: MaterialKind::Standard { metalness, roughness },
            color,
            opacity: 1.0,
            transparent: false,
            wireframe: false,
            visible: true,
        }
    }

    pub fn basic(color: Color) -> Self {
        Self {
            kind: MaterialKind::Basic,
            ..Self::standard(color, 0.0, 1.0)
        }
    }

    pub fn line(color: Color, opacity: f32) -> Self {
        Self {
            kind: MaterialKind::Line { dash: None, width: 1.0 },
            opacity,
            transparent: opacity < 1.0,
            ..Self::standard(color, 0.0, 1.0)
        }
    }

    pub fn sprite(map: TextureId) -> Self {
        Self {
            kind: MaterialKind::Sprite { map },
            transparent: true,
            ..Self::standard(Color::WHITE, 0.0, 1.0)
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.transparent = self.opacity < 1.0;
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    /// Effective RGBA (material opacity folded into alpha).
    pub fn rgba(&self) -> Color {
        self.color.with_alpha(self.color.a * self.opacity)
    }

    /// Texture referenced by this material, if any.
    pub fn map(&self) -> Option<TextureId> {
        match self.kind {
            MaterialKind::Sprite { map } => Some(map),
            _ => None,
        }
    }
}

// ============================================================================
// TEXTURE
// ============================================================================

#[derive(Clone, Debug)]
pub struct Texture {
    pub image: RgbaImage,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// ============================================================================
// POOL
// ============================================================================

/// Number of live resources per type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.geometries + self.materials + self.textures
    }
}

/// Owner of every geometry, material and texture in a session.
#[derive(Default)]
pub struct ResourcePool {
    geometries: BTreeMap<GeometryId, Geometry>,
    materials: BTreeMap<MaterialId, Material>,
    textures: BTreeMap<TextureId, Texture>,
    next_id: u32,
    released: Vec<ResourceHandle>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        let id = GeometryId(self.next());
        self.geometries.insert(id, geometry);
        id
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.next());
        self.materials.insert(id, material);
        id
    }

    pub fn add_texture(&mut self, image: RgbaImage) -> TextureId {
        let id = TextureId(self.next());
        self.textures.insert(id, Texture { image });
        id
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.geometries.get_mut(&id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn dispose_geometry(&mut self, id: GeometryId) -> Result<(), ResourceError> {
        self.geometries
            .remove(&id)
            .ok_or(ResourceError::UnknownGeometry(id.0))?;
        self.released.push(ResourceHandle::Geometry(id));
        Ok(())
    }

    pub fn dispose_material(&mut self, id: MaterialId) -> Result<(), ResourceError> {
        self.materials
            .remove(&id)
            .ok_or(ResourceError::UnknownMaterial(id.0))?;
        self.released.push(ResourceHandle::Material(id));
        Ok(())
    }

    pub fn dispose_texture(&mut self, id: TextureId) -> Result<(), ResourceError> {
        self.textures
            .remove(&id)
            .ok_or(ResourceError::UnknownTexture(id.0))?;
        self.released.push(ResourceHandle::Texture(id));
        Ok(())
    }

    /// Handles disposed since the last call, for backend cache eviction.
    pub fn take_released(&mut self) -> Vec<ResourceHandle> {
        std::mem::take(&mut self.released)
    }

    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            geometries: self.geometries.len(),
            materials: self.materials.len(),
            textures: self.textures.len(),
        }
    }

    /// Every live handle, used for the final sweep on session disposal.
    pub fn live_handles(&self) -> Vec<ResourceHandle> {
        self.geometries
            .keys()
            .map(|&id| ResourceHandle::Geometry(id))
            .chain(self.materials.keys().map(|&id| ResourceHandle::Material(id)))
            .chain(self.textures.keys().map(|&id| ResourceHandle::Texture(id)))
            .collect()
    }

    pub fn dispose(&mut self, handle: ResourceHandle) -> Result<(), ResourceError> {
        match handle {
            ResourceHandle::Geometry(id) => self.dispose_geometry(id),
            ResourceHandle::Material(id) => self.dispose_material(id),
            ResourceHandle::Texture(id) => self.dispose_texture(id),
        }
    }
}
