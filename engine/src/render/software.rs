//! Software Renderer
//!
//! CPU rasterizer used when no wgpu adapter is available (CI, containers,
//! headless servers). Draws the same `DrawList` as the GPU backend:
//! z-buffered Gouraud triangles with Lambert lighting, thick lines, and
//! alpha-blended billboard sprites.
//!
//! Triangles are double sided. A triangle with any vertex behind the camera
//! is skipped rather than clipped. Lines are clipped to the near plane and
//! then to the viewport before they are stepped.

use glam::{Mat4, Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use crate::error::RenderError;
use crate::scene::camera::project_with;
use crate::scene::{Color, DrawList, ResourceHandle, ResourcePool, Texture};

use super::backend::RenderBackend;

/// Depth offset applied to lines so they win against the surface they lie on.
const LINE_DEPTH_BIAS: f32 = 1e-4;

/// Projected vertex: pixel position, NDC depth, shaded color.
#[derive(Clone, Copy, Debug)]
struct ScreenVertex {
    pos: Vec2,
    depth: f32,
    color: [f32; 4],
}

pub struct SoftwareBackend {
    width: u32,
    height: u32,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
    has_frame: bool,
    disposed: bool,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        let mut backend = Self {
            width: 1,
            height: 1,
            color: Vec::new(),
            depth: Vec::new(),
            has_frame: false,
            disposed: false,
        };
        backend.resize(width, height);
        backend
    }

    fn clear(&mut self, background: Color) {
        self.color.fill(background.to_array());
        self.depth.fill(f32::INFINITY);
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Depth-tested write. Opaque fragments update the depth buffer.
    fn plot(&mut self, x: i32, y: i32, depth: f32, color: [f32; 4], write_depth: bool) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        if !(0.0..=1.0).contains(&depth) || depth >= self.depth[i] {
            return;
        }
        let alpha = color[3].clamp(0.0, 1.0);
        let dst = self.color[i];
        self.color[i] = [
            color[0] * alpha + dst[0] * (1.0 - alpha),
            color[1] * alpha + dst[1] * (1.0 - alpha),
            color[2] * alpha + dst[2] * (1.0 - alpha),
            1.0,
        ];
        if write_depth && alpha >= 0.999 {
            self.depth[i] = depth;
        }
    }

    fn project(&self, view_proj: &Mat4, point: Vec3) -> Option<(Vec2, f32)> {
        project_with(view_proj, point, self.width, self.height)
    }

    fn fill_triangle(&mut self, v: [ScreenVertex; 3]) {
        let area = edge(v[0].pos, v[1].pos, v[2].pos);
        if area.abs() < f32::EPSILON {
            return;
        }
        let (min, max) = self.clamped_bounds(&[v[0].pos, v[1].pos, v[2].pos]);
        for y in min.1..=max.1 {
            for x in min.0..=max.0 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(v[1].pos, v[2].pos, p) / area;
                let w1 = edge(v[2].pos, v[0].pos, p) / area;
                let w2 = 1.0 - w0 - w1;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let depth = w0 * v[0].depth + w1 * v[1].depth + w2 * v[2].depth;
                let mut color = [0.0; 4];
                for (c, out) in color.iter_mut().enumerate() {
                    *out = w0 * v[0].color[c] + w1 * v[1].color[c] + w2 * v[2].color[c];
                }
                self.plot(x, y, depth, color, true);
            }
        }
    }

    /// Clip-space point to pixel position and NDC depth. `w` must be positive.
    fn to_screen(&self, clip: Vec4) -> (Vec2, f32) {
        let ndc = clip.truncate() / clip.w;
        let px = (ndc.x * 0.5 + 0.5) * self.width as f32;
        let py = (1.0 - (ndc.y * 0.5 + 0.5)) * self.height as f32;
        (Vec2::new(px, py), ndc.z)
    }

    fn draw_line(&mut self, a: (Vec2, f32), b: (Vec2, f32), color: [f32; 4], width: f32) {
        let radius = ((width.max(1.0) - 1.0) / 2.0).round() as i32;
        let margin = radius as f32 + 1.0;
        let min = Vec2::splat(-margin);
        let max = Vec2::new(self.width as f32 + margin, self.height as f32 + margin);
        let Some((t0, t1)) = clip_to_rect(a.0, b.0, min, max) else {
            return;
        };
        let lerp = |t: f32| (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
        let (a, b) = (lerp(t0), lerp(t1));

        let delta = b.0 - a.0;
        let steps = delta.abs().max_element().ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let p = a.0 + delta * t;
            let depth = a.1 + (b.1 - a.1) * t - LINE_DEPTH_BIAS;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    self.plot(p.x as i32 + dx, p.y as i32 + dy, depth, color, false);
                }
            }
        }
    }

    fn draw_sprite(&mut self, corners: [(Vec2, f32); 4], texture: &Texture, opacity: f32) {
        // Corners are bottom-left, bottom-right, top-right, top-left
        let uvs = [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0)];
        for [i0, i1, i2] in [[0, 1, 2], [0, 2, 3]] {
            let (p0, p1, p2) = (corners[i0].0, corners[i1].0, corners[i2].0);
            let area = edge(p0, p1, p2);
            if area.abs() < f32::EPSILON {
                continue;
            }
            let (min, max) = self.clamped_bounds(&[p0, p1, p2]);
            for y in min.1..=max.1 {
                for x in min.0..=max.0 {
                    let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let w0 = edge(p1, p2, p) / area;
                    let w1 = edge(p2, p0, p) / area;
                    let w2 = 1.0 - w0 - w1;
                    if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                        continue;
                    }
                    let uv = uvs[i0] * w0 + uvs[i1] * w1 + uvs[i2] * w2;
                    let texel = sample_nearest(texture, uv);
                    if texel[3] <= 0.0 {
                        continue;
                    }
                    let depth = w0 * corners[i0].1 + w1 * corners[i1].1 + w2 * corners[i2].1;
                    let color = [texel[0], texel[1], texel[2], texel[3] * opacity];
                    self.plot(x, y, depth, color, false);
                }
            }
        }
    }

    /// Pixel bounding box of `points`, clipped to the frame.
    fn clamped_bounds(&self, points: &[Vec2]) -> ((i32, i32), (i32, i32)) {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        let w = self.width as i32 - 1;
        let h = self.height as i32 - 1;
        (
            ((min.x.floor() as i32).clamp(0, w), (min.y.floor() as i32).clamp(0, h)),
            ((max.x.ceil() as i32).clamp(-1, w), (max.y.ceil() as i32).clamp(-1, h)),
        )
    }
}

/// Clip a clip-space segment to the near plane (`z >= 0` in wgpu's depth range).
fn clip_to_near(a: Vec4, b: Vec4) -> Option<(Vec4, Vec4)> {
    match (a.z >= 0.0, b.z >= 0.0) {
        (true, true) => Some((a, b)),
        (false, false) => None,
        (a_inside, _) => {
            let t = a.z / (a.z - b.z);
            let cut = a + (b - a) * t;
            if a_inside { Some((a, cut)) } else { Some((cut, b)) }
        }
    }
}

/// Liang-Barsky: parameter range of `a → b` inside the rectangle.
fn clip_to_rect(a: Vec2, b: Vec2, min: Vec2, max: Vec2) -> Option<(f32, f32)> {
    if !(a.is_finite() && b.is_finite()) {
        return None;
    }
    let d = b - a;
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [(-d.x, a.x - min.x), (d.x, max.x - a.x), (-d.y, a.y - min.y), (d.y, max.y - a.y)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn sample_nearest(texture: &Texture, uv: Vec2) -> [f32; 4] {
    let (w, h) = (texture.width(), texture.height());
    if w == 0 || h == 0 {
        return [0.0; 4];
    }
    let x = ((uv.x * w as f32) as u32).min(w - 1);
    let y = ((uv.y * h as f32) as u32).min(h - 1);
    let Rgba(p) = *texture.image.get_pixel(x, y);
    [
        p[0] as f32 / 255.0,
        p[1] as f32 / 255.0,
        p[2] as f32 / 255.0,
        p[3] as f32 / 255.0,
    ]
}

impl RenderBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let len = self.width as usize * self.height as usize;
        self.color = vec![[0.0, 0.0, 0.0, 1.0]; len];
        self.depth = vec![f32::INFINITY; len];
        self.has_frame = false;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, list: &DrawList, resources: &ResourcePool) -> Result<(), RenderError> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }
        self.clear(list.background);
        let view_proj = list.view_proj;

        for tri in list.triangles.chunks_exact(3) {
            let mut screen = [ScreenVertex {
                pos: Vec2::ZERO,
                depth: 0.0,
                color: [0.0; 4],
            }; 3];
            let mut visible = true;
            for (out, vertex) in screen.iter_mut().zip(tri) {
                let Some((pos, depth)) = self.project(&view_proj, vertex.position()) else {
                    visible = false;
                    break;
                };
                let color = list.lighting.shade(Color::from(vertex.color), vertex.normal());
                *out = ScreenVertex {
                    pos,
                    depth,
                    color: color.to_array(),
                };
            }
            if visible {
                self.fill_triangle(screen);
            }
        }

        for line in &list.lines {
            let Some((a, b)) = clip_to_near(view_proj * line.a.extend(1.0), view_proj * line.b.extend(1.0)) else {
                continue;
            };
            let (a, b) = (self.to_screen(a), self.to_screen(b));
            self.draw_line(a, b, line.color.to_array(), line.width);
        }

        for sprite in &list.sprites {
            let Some(texture) = resources.texture(sprite.texture) else {
                continue;
            };
            let corners = sprite.corners(list.camera_right, list.camera_up);
            let projected: Option<Vec<_>> = corners.iter().map(|c| self.project(&view_proj, *c)).collect();
            let Some(projected) = projected else {
                continue;
            };
            let corners = [projected[0], projected[1], projected[2], projected[3]];
            self.draw_sprite(corners, texture, sprite.opacity);
        }

        self.has_frame = true;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RgbaImage, RenderError> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }
        if !self.has_frame {
            return Err(RenderError::NoFrame);
        }
        let mut image = RgbaImage::new(self.width, self.height);
        for (pixel, color) in image.pixels_mut().zip(&self.color) {
            *pixel = Rgba(Color::from(*color).to_rgba8());
        }
        Ok(image)
    }

    fn release(&mut self, _handle: ResourceHandle) {}

    fn dispose(&mut self) {
        self.color = Vec::new();
        self.depth = Vec::new();
        self.has_frame = false;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::scene::geometry::box_geometry;
    use crate::scene::{Geometry, LabCamera, Material, Node, NodeKind, SceneGraph};

    fn camera_looking_at_origin() -> LabCamera {
        let mut camera = LabCamera::from_config(&SceneConfig::default(), 1.0);
        camera.set_position(Vec3::new(0.0, 10.0, 10.0));
        camera
    }

    #[test]
    fn test_capture_before_render_fails() {
        let mut backend = SoftwareBackend::new(16, 16);
        assert!(matches!(backend.capture_frame(), Err(RenderError::NoFrame)));
    }

    #[test]
    fn test_background_fill() {
        let graph = SceneGraph::new();
        let pool = ResourcePool::new();
        let mut backend = SoftwareBackend::new(8, 6);
        let list = DrawList::build(&graph, &pool, &camera_looking_at_origin(), Color::from_hex(0x102030));
        backend.render(&list, &pool).unwrap();
        let frame = backend.capture_frame().unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(frame.get_pixel(3, 3).0, [0x10, 0x20, 0x30, 0xff]);
    }

    #[test]
    fn test_box_covers_center() {
        let mut graph = SceneGraph::new();
        let mut pool = ResourcePool::new();
        let geometry = pool.add_geometry(box_geometry(Vec3::splat(4.0)));
        let material = pool.add_material(Material::basic(Color::from_hex(0xff0000)));
        graph.add_to_root(Node::new("box", NodeKind::Mesh { geometry, material }));

        let mut backend = SoftwareBackend::new(32, 32);
        let list = DrawList::build(&graph, &pool, &camera_looking_at_origin(), Color::BLACK);
        backend.render(&list, &pool).unwrap();
        let frame = backend.capture_frame().unwrap();
        assert_eq!(frame.get_pixel(16, 16).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_disposed_backend_refuses_work() {
        let graph = SceneGraph::new();
        let pool = ResourcePool::new();
        let mut backend = SoftwareBackend::new(4, 4);
        backend.dispose();
        let list = DrawList::build(&graph, &pool, &camera_looking_at_origin(), Color::BLACK);
        assert!(matches!(backend.render(&list, &pool), Err(RenderError::Disposed)));
        assert!(matches!(backend.capture_frame(), Err(RenderError::Disposed)));
    }

    #[test]
    fn test_line_through_near_plane_is_clipped() {
        let camera = camera_looking_at_origin();
        let eye = camera.eye_position();
        // A hair in front of the eye: positive w, far behind the near plane
        let start = eye + (Vec3::ZERO - eye) * 1e-7;

        let mut graph = SceneGraph::new();
        let mut pool = ResourcePool::new();
        let geometry = pool.add_geometry(Geometry::line_strip(vec![start, Vec3::new(3.0, 0.0, 0.0)]));
        let material = pool.add_material(Material::line(Color::WHITE, 1.0));
        graph.add_to_root(Node::new("line", NodeKind::Line { geometry, material }));

        let mut backend = SoftwareBackend::new(32, 32);
        let list = DrawList::build(&graph, &pool, &camera, Color::BLACK);
        backend.render(&list, &pool).unwrap();
        let frame = backend.capture_frame().unwrap();
        let (end, _) = camera.project(Vec3::new(3.0, 0.0, 0.0), 32, 32).unwrap();
        let (ex, ey) = (end.x as i32, end.y as i32);
        let lit_near_end = (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (ex + dx, ey + dy)))
            .filter(|&(x, y)| (0..32).contains(&x) && (0..32).contains(&y))
            .any(|(x, y)| frame.get_pixel(x as u32, y as u32).0 == [255, 255, 255, 255]);
        assert!(lit_near_end);
    }

    #[test]
    fn test_clip_to_near_keeps_front_part() {
        let front = Vec4::new(0.0, 0.0, 0.5, 1.0);
        let behind = Vec4::new(0.0, 0.0, -0.5, 0.1);
        let (a, b) = clip_to_near(behind, front).unwrap();
        assert!(a.z.abs() < 1e-6 && a.w > 0.0);
        assert_eq!(b, front);
        assert!(clip_to_near(behind, behind).is_none());
    }

    #[test]
    fn test_clip_to_rect_bounds_huge_segments() {
        let (min, max) = (Vec2::ZERO, Vec2::splat(10.0));
        let (t0, t1) = clip_to_rect(Vec2::new(-1e30, 5.0), Vec2::new(5.0, 5.0), min, max).unwrap();
        assert!(t0 > 0.99 && t1 == 1.0);
        assert!(clip_to_rect(Vec2::new(20.0, 0.0), Vec2::new(30.0, 5.0), min, max).is_none());
        assert!(clip_to_rect(Vec2::new(f32::NAN, 0.0), Vec2::ZERO, min, max).is_none());
    }

    #[test]
    fn test_resize_clamps_zero() {
        let mut backend = SoftwareBackend::new(0, 0);
        assert_eq!(backend.size(), (1, 1));
        backend.resize(20, 10);
        assert_eq!(backend.size(), (20, 10));
    }
}
