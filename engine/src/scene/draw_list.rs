//! Draw List
//!
//! Flattens the scene graph into world-space primitives for one frame:
//! triangle vertices, line segments and camera-facing sprites. Every render
//! backend and the vector exporter consume this list, so graph traversal,
//! visibility, wireframe expansion and dash expansion happen in one place.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec3};

use super::camera::LabCamera;
use super::color::Color;
use super::graph::{Light, NodeId, NodeKind, SceneGraph};
use super::resources::{Geometry, MaterialKind, ResourcePool, TextureId, Topology};

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Triangle vertex in world space.
///
/// A zero normal marks an unlit vertex.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

static_assertions::assert_eq_size!(DrawVertex, [u8; 40]);

impl DrawVertex {
    pub fn new(position: Vec3, normal: Vec3, color: Color) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: color.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    pub fn is_lit(&self) -> bool {
        self.normal != [0.0; 3]
    }
}

/// One world-space line segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawLine {
    pub a: Vec3,
    pub b: Vec3,
    pub color: Color,
    /// Width in pixels
    pub width: f32,
}

/// Camera-facing textured quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawSprite {
    pub center: Vec3,
    /// World-space width and height
    pub size: Vec2,
    pub texture: TextureId,
    pub opacity: f32,
}

impl DrawSprite {
    /// Quad corners (bottom-left, bottom-right, top-right, top-left).
    pub fn corners(&self, right: Vec3, up: Vec3) -> [Vec3; 4] {
        let r = right * self.size.x * 0.5;
        let u = up * self.size.y * 0.5;
        [
            self.center - r - u,
            self.center + r - u,
            self.center + r + u,
            self.center - r + u,
        ]
    }
}

/// Directional + ambient lighting gathered from light nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    /// Unit vector pointing toward the light
    pub direction: Vec3,
    pub directional: Color,
    pub ambient: Color,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            direction: Vec3::Y,
            directional: Color::BLACK,
            ambient: Color::WHITE,
        }
    }
}

impl Lighting {
    /// Lambert shading of `color` for a surface with `normal`.
    pub fn shade(&self, color: Color, normal: Vec3) -> Color {
        if normal == Vec3::ZERO {
            return color;
        }
        let diffuse = normal.normalize_or_zero().dot(self.direction).max(0.0);
        Color {
            r: color.r * (self.ambient.r + self.directional.r * diffuse),
            g: color.g * (self.ambient.g + self.directional.g * diffuse),
            b: color.b * (self.ambient.b + self.directional.b * diffuse),
            a: color.a,
        }
    }
}

// ============================================================================
// DRAW LIST
// ============================================================================

#[derive(Clone, Debug)]
pub struct DrawList {
    pub background: Color,
    pub view_proj: Mat4,
    pub camera_right: Vec3,
    pub camera_up: Vec3,
    pub eye: Vec3,
    pub lighting: Lighting,
    /// Non-indexed triangle list (three vertices per triangle)
    pub triangles: Vec<DrawVertex>,
    pub lines: Vec<DrawLine>,
    /// Sorted far to near
    pub sprites: Vec<DrawSprite>,
}

impl DrawList {
    /// Collect every visible primitive of `graph` as seen from `camera`.
    pub fn build(graph: &SceneGraph, resources: &ResourcePool, camera: &LabCamera, background: Color) -> Self {
        let (camera_right, camera_up) = camera.basis();
        let mut list = Self {
            background,
            view_proj: camera.view_projection_matrix(),
            camera_right,
            camera_up,
            eye: camera.eye_position(),
            lighting: gather_lighting(graph),
            triangles: Vec::new(),
            lines: Vec::new(),
            sprites: Vec::new(),
        };

        for id in graph.traverse(graph.root()) {
            if !graph.is_visible(id) {
                continue;
            }
            list.push_node(graph, resources, id);
        }

        let eye = list.eye;
        list.sprites.sort_by(|a, b| {
            let da = a.center.distance_squared(eye);
            let db = b.center.distance_squared(eye);
            db.total_cmp(&da)
        });
        list
    }

    fn push_node(&mut self, graph: &SceneGraph, resources: &ResourcePool, id: NodeId) {
        let Some(node) = graph.get(id) else {
            return;
        };
        let world = graph.world_matrix(id);
        match node.kind {
            NodeKind::Mesh { geometry, material } | NodeKind::Line { geometry, material } => {
                let (Some(geometry), Some(material)) = (resources.geometry(geometry), resources.material(material)) else {
                    return;
                };
                if !material.visible {
                    return;
                }
                let color = material.rgba();
                match (&material.kind, geometry.topology) {
                    (MaterialKind::Line { dash, width }, _) => {
                        self.push_edges(geometry, &world, color, *width, *dash);
                    }
                    (_, Topology::Triangles) if material.wireframe => {
                        self.push_edges(geometry, &world, color, 1.0, None);
                    }
                    (kind, Topology::Triangles) => {
                        let lit = matches!(kind, MaterialKind::Standard { .. });
                        self.push_triangles(geometry, &world, color, lit);
                    }
                    (_, _) => self.push_edges(geometry, &world, color, 1.0, None),
                }
            }
            NodeKind::Sprite { material } => {
                let Some(material) = resources.material(material) else {
                    return;
                };
                let Some(texture) = material.map() else {
                    return;
                };
                if !material.visible {
                    return;
                }
                let (scale, _, translation) = world.to_scale_rotation_translation();
                self.sprites.push(DrawSprite {
                    center: translation,
                    size: Vec2::new(scale.x, scale.y),
                    texture,
                    opacity: material.opacity,
                });
            }
            NodeKind::Group | NodeKind::Light(_) => {}
        }
    }

    fn push_triangles(&mut self, geometry: &Geometry, world: &Mat4, color: Color, lit: bool) {
        let normal_matrix = Mat3::from_mat4(*world).inverse().transpose();
        for &index in &geometry.indices {
            let i = index as usize;
            let Some(&p) = geometry.positions.get(i) else {
                continue;
            };
            let normal = if lit {
                geometry
                    .normals
                    .get(i)
                    .map(|n| (normal_matrix * *n).normalize_or_zero())
                    .unwrap_or(Vec3::Y)
            } else {
                Vec3::ZERO
            };
            self.triangles.push(DrawVertex::new(world.transform_point3(p), normal, color));
        }
        // Drop a trailing partial triangle left by a bad index
        let whole = self.triangles.len() - self.triangles.len() % 3;
        self.triangles.truncate(whole);
    }

    fn push_edges(&mut self, geometry: &Geometry, world: &Mat4, color: Color, width: f32, dash: Option<(f32, f32)>) {
        let mut travelled = 0.0;
        for (ia, ib) in geometry.edges() {
            let (Some(&a), Some(&b)) = (geometry.positions.get(ia as usize), geometry.positions.get(ib as usize)) else {
                continue;
            };
            let (a, b) = (world.transform_point3(a), world.transform_point3(b));
            match dash {
                Some((dash_size, gap_size)) if dash_size > 0.0 => {
                    travelled = push_dashed(&mut self.lines, a, b, color, width, dash_size, gap_size.max(0.0), travelled);
                }
                _ => self.lines.push(DrawLine { a, b, color, width }),
            }
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.lines.is_empty() && self.sprites.is_empty()
    }
}

/// Split `a → b` into dashes, continuing the pattern from `offset` along the
/// polyline. Returns the new offset.
#[allow(clippy::too_many_arguments)]
fn push_dashed(
    out: &mut Vec<DrawLine>,
    a: Vec3,
    b: Vec3,
    color: Color,
    width: f32,
    dash_size: f32,
    gap_size: f32,
    offset: f32,
) -> f32 {
    let length = a.distance(b);
    if length <= f32::EPSILON {
        return offset;
    }
    let period = dash_size + gap_size;
    let mut t = 0.0;
    while t < length {
        let phase = (offset + t) % period;
        if phase < dash_size {
            let end = (t + dash_size - phase).min(length);
            out.push(DrawLine {
                a: a.lerp(b, t / length),
                b: a.lerp(b, end / length),
                color,
                width,
            });
            t = end;
        } else {
            t += period - phase;
        }
    }
    offset + length
}

fn gather_lighting(graph: &SceneGraph) -> Lighting {
    let mut lighting = Lighting {
        direction: Vec3::Y,
        directional: Color::BLACK,
        ambient: Color::BLACK,
    };
    let mut found = false;
    for id in graph.traverse(graph.root()) {
        let Some(node) = graph.get(id) else { continue };
        if !graph.is_visible(id) {
            continue;
        }
        match node.kind {
            NodeKind::Light(Light::Directional { color, intensity }) => {
                lighting.direction = graph.world_position(id).try_normalize().unwrap_or(Vec3::Y);
                lighting.directional = color.scale_rgb(intensity);
                found = true;
            }
            NodeKind::Light(Light::Ambient { color, intensity }) => {
                let add = color.scale_rgb(intensity);
                lighting.ambient.r += add.r;
                lighting.ambient.g += add.g;
                lighting.ambient.b += add.b;
                found = true;
            }
            _ => {}
        }
    }
    if found { lighting } else { Lighting::default() }
}
