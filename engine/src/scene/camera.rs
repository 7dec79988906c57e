//! Lab Camera
//!
//! Spherical-coordinate perspective camera with damped orbit controls.
//! Orbit and zoom requests accumulate as pending deltas; every
//! [`LabCamera::update`] applies a `damping_factor` share of them and decays
//! the rest, so motion eases out over several frames.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::config::SceneConfig;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Minimum zoom distance.
const MIN_DISTANCE: f32 = 2.0;
/// Maximum zoom distance.
const MAX_DISTANCE: f32 = 1500.0;

/// Elevation limits in degrees (prevent flipping over the pole).
const MIN_ELEVATION: f32 = -89.0;
const MAX_ELEVATION: f32 = 89.0;

/// Pending motion below this is dropped.
const SETTLE_EPSILON: f32 = 1e-4;

// ============================================================================
// CAMERA
// ============================================================================

/// Orbit camera looking at `target`.
///
/// # Coordinate System
/// - Azimuth: horizontal angle in degrees, measured from +Z toward +X
/// - Elevation: vertical angle in degrees (clamped -89 to 89)
/// - Y is up
#[derive(Debug, Clone)]
pub struct LabCamera {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub target: Vec3,
    /// Viewport aspect ratio (width / height).
    pub aspect: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Share of pending motion applied per update.
    pub damping_factor: f32,

    pending_azimuth: f32,
    pending_elevation: f32,
    /// Multiplicative zoom still to apply, stored as ln(scale).
    pending_zoom: f32,
}

impl LabCamera {
    /// Camera placed at `config.camera_position`, looking at the origin.
    pub fn from_config(config: &SceneConfig, aspect: f32) -> Self {
        let mut camera = Self {
            azimuth: 0.0,
            elevation: 0.0,
            distance: 1.0,
            target: Vec3::ZERO,
            aspect,
            fov: config.camera_fov,
            near: config.camera_near,
            far: config.camera_far,
            damping_factor: config.damping_factor.clamp(0.0, 1.0),
            pending_azimuth: 0.0,
            pending_elevation: 0.0,
            pending_zoom: 0.0,
        };
        camera.set_position(config.camera_position);
        camera
    }

    /// Move the eye to `position` while keeping the current target.
    pub fn set_position(&mut self, position: Vec3) {
        let offset = position - self.target;
        let distance = offset.length().max(MIN_DISTANCE);
        self.distance = distance;
        self.azimuth = offset.x.atan2(offset.z).to_degrees();
        self.elevation = (offset.y / distance)
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(MIN_ELEVATION, MAX_ELEVATION);
    }

    /// Eye position from spherical coordinates.
    pub fn eye_position(&self) -> Vec3 {
        let azim_rad = self.azimuth.to_radians();
        let elev_rad = self.elevation.to_radians();

        let cos_elev = elev_rad.cos();
        let offset = Vec3::new(
            self.distance * cos_elev * azim_rad.sin(),
            self.distance * elev_rad.sin(),
            self.distance * cos_elev * azim_rad.cos(),
        );

        self.target + offset
    }

    // ========================================================================
    // MATRIX COMPUTATION
    // ========================================================================

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    /// Perspective projection with wgpu's `[0, 1]` depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera right and up axes in world space (for billboards).
    pub fn basis(&self) -> (Vec3, Vec3) {
        let view = self.view_matrix();
        let right = Vec3::new(view.x_axis.x, view.y_axis.x, view.z_axis.x);
        let up = Vec3::new(view.x_axis.y, view.y_axis.y, view.z_axis.y);
        (right, up)
    }

    // ========================================================================
    // CONTROLS
    // ========================================================================

    /// Queue an orbit by the given angles (degrees).
    pub fn orbit(&mut self, azimuth: f32, elevation: f32) {
        self.pending_azimuth += azimuth;
        self.pending_elevation += elevation;
    }

    /// Queue a zoom. Positive delta moves closer.
    pub fn zoom(&mut self, delta: f32) {
        self.pending_zoom -= delta * 0.1;
    }

    /// Advance the damped controls by one frame.
    ///
    /// Returns `true` while motion is still pending.
    pub fn update(&mut self) -> bool {
        let k = self.damping_factor;
        self.azimuth = (self.azimuth + self.pending_azimuth * k).rem_euclid(360.0);
        self.elevation =
            (self.elevation + self.pending_elevation * k).clamp(MIN_ELEVATION, MAX_ELEVATION);
        self.distance = (self.distance * (self.pending_zoom * k).exp()).clamp(MIN_DISTANCE, MAX_DISTANCE);

        let decay = 1.0 - k;
        self.pending_azimuth *= decay;
        self.pending_elevation *= decay;
        self.pending_zoom *= decay;

        let moving = self.pending_azimuth.abs() > SETTLE_EPSILON
            || self.pending_elevation.abs() > SETTLE_EPSILON
            || self.pending_zoom.abs() > SETTLE_EPSILON;
        if !moving {
            self.pending_azimuth = 0.0;
            self.pending_elevation = 0.0;
            self.pending_zoom = 0.0;
        }
        moving
    }

    /// Update the aspect ratio after a viewport resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    // ========================================================================
    // PROJECTION
    // ========================================================================

    /// Project a world point to pixel coordinates (origin top-left).
    ///
    /// Returns the pixel position and NDC depth, or `None` when the point is
    /// behind the camera.
    pub fn project(&self, point: Vec3, width: u32, height: u32) -> Option<(Vec2, f32)> {
        project_with(&self.view_projection_matrix(), point, width, height)
    }
}

/// Project with a precomputed view-projection matrix.
pub fn project_with(view_proj: &Mat4, point: Vec3, width: u32, height: u32) -> Option<(Vec2, f32)> {
    let clip: Vec4 = *view_proj * point.extend(1.0);
    if clip.w <= 1e-6 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let px = (ndc.x * 0.5 + 0.5) * width as f32;
    let py = (1.0 - (ndc.y * 0.5 + 0.5)) * height as f32;
    Some((Vec2::new(px, py), ndc.z))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_from_config_reproduces_start_position() {
        let config = SceneConfig::default();
        let cam = LabCamera::from_config(&config, 16.0 / 9.0);
        let eye = cam.eye_position();
        assert!((eye - config.camera_position).length() < 1e-2, "eye {eye:?}");
        assert!(approx_eq(cam.fov, 55.0));
    }

    #[test]
    fn test_orbit_is_damped() {
        let mut cam = LabCamera::from_config(&SceneConfig::default(), 1.0);
        let start = cam.azimuth;
        cam.orbit(10.0, 0.0);
        assert!(cam.update());
        let first_step = (cam.azimuth - start).rem_euclid(360.0);
        assert!(approx_eq(first_step, 10.0 * cam.damping_factor));

        for _ in 0..1000 {
            cam.update();
        }
        let total = (cam.azimuth - start).rem_euclid(360.0);
        assert!((total - 10.0).abs() < 0.01, "total {total}");
        assert!(!cam.update());
    }

    #[test]
    fn test_elevation_clamped() {
        let mut cam = LabCamera::from_config(&SceneConfig::default(), 1.0);
        cam.damping_factor = 1.0;
        cam.orbit(0.0, 500.0);
        cam.update();
        assert!(cam.elevation <= MAX_ELEVATION);
    }

    #[test]
    fn test_zoom_in_decreases_distance() {
        let mut cam = LabCamera::from_config(&SceneConfig::default(), 1.0);
        cam.damping_factor = 1.0;
        let initial = cam.distance;
        cam.zoom(1.0);
        cam.update();
        assert!(cam.distance < initial);
    }

    #[test]
    fn test_resize_zero_ignored() {
        let mut cam = LabCamera::from_config(&SceneConfig::default(), 1.5);
        cam.resize(0, 0);
        assert!(approx_eq(cam.aspect, 1.5));
        cam.resize(1920, 1080);
        assert!(approx_eq(cam.aspect, 1920.0 / 1080.0));
    }

    #[test]
    fn test_target_projects_to_viewport_center() {
        let cam = LabCamera::from_config(&SceneConfig::default(), 2.0);
        let (px, depth) = cam.project(Vec3::ZERO, 200, 100).unwrap();
        assert!(approx_eq(px.x, 100.0));
        assert!(approx_eq(px.y, 50.0));
        assert!((0.0..1.0).contains(&depth));
    }

    #[test]
    fn test_point_behind_camera_not_projected() {
        let cam = LabCamera::from_config(&SceneConfig::default(), 1.0);
        let behind = cam.eye_position() * 2.0;
        assert!(cam.project(behind, 100, 100).is_none());
    }
}
