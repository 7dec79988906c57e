//! Lab Session
//!
//! One lifecycle of the 3D lab. The session owns the scene context (graph,
//! resources, camera, terrain, POIs, roads, areas), the render capability
//! and the host registrations, and moves through
//! `Uninitialized → DependenciesLoading → Ready → Disposed`.
//!
//! Failures at the async boundaries (capability load, heightmap fetch) and
//! rejected preconditions become banners, toasts and log lines; none of
//! them escape into the frame loop.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::LabConfig;
use crate::error::LabError;
use crate::export::{ExportKind, ExportPipeline, ExportScene};
use crate::overlay::{Area, AreaLayer, AreaSpec, Road, RoadId, RoadNetwork, RoadStyleSpec};
use crate::pathfinding::EffortPathfinder;
use crate::poi::{LabelStyle, Poi, PoiKind, PoiRegistry};
use crate::render::{CapabilityLoader, RenderBackend, RenderCapability};
use crate::scene::{
    self, Color, DrawList, LabCamera, Light, Material, Node, NodeKind, ResourceCounts, ResourcePool,
    SceneGraph, geometry,
};
use crate::terrain::{HeightField, HeightmapSource, TerrainSurfaces, VisualizationMode, mesh_builder};

use super::commands::SessionCommand;
use super::feedback::{BannerKind, Feedback, ToastKind};
use super::host::{FrameHandle, HostEvent, HostSurface, ListenerId, SurfaceId};

const NO_RENDERER_MESSAGE: &str = "Failed to load the 3D renderer. The terrain lab cannot start.";
const NO_TERRAIN_MESSAGE: &str = "No terrain data available. Generate a heightmap first.";

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    DependenciesLoading,
    Ready { terrain: bool },
    Disposed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::DependenciesLoading => "loading dependencies",
            Self::Ready { terrain: false } => "ready without terrain",
            Self::Ready { terrain: true } => "ready",
            Self::Disposed => "disposed",
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Everything the lab's operations read and mutate.
pub struct SceneContext {
    pub graph: SceneGraph,
    pub pool: ResourcePool,
    pub camera: LabCamera,
    pub background: Color,
    pub field: Option<HeightField>,
    pub surfaces: Option<TerrainSurfaces>,
    pub mode: VisualizationMode,
    pub pois: PoiRegistry,
    pub roads: RoadNetwork,
    pub areas: AreaLayer,
}

impl SceneContext {
    fn new(config: &LabConfig, aspect: f32) -> Self {
        Self {
            graph: SceneGraph::new(),
            pool: ResourcePool::new(),
            camera: LabCamera::from_config(&config.scene, aspect),
            background: Color::from_hex(config.scene.background_color),
            field: None,
            surfaces: None,
            mode: VisualizationMode::default(),
            pois: PoiRegistry::new(config.poi.clone(), config.label.clone()),
            roads: RoadNetwork::new(config.road.clone()),
            areas: AreaLayer::new(config.area.clone()),
        }
    }

    /// Lights and the ground grid.
    fn populate(&mut self, config: &LabConfig) {
        let lighting = &config.lighting;
        self.graph.add_to_root(
            Node::new(
                "DirectionalLight",
                NodeKind::Light(Light::Directional {
                    color: Color::from_hex(lighting.directional_color),
                    intensity: lighting.directional_intensity,
                }),
            )
            .at(lighting.directional_position),
        );
        self.graph.add_to_root(Node::new(
            "AmbientLight",
            NodeKind::Light(Light::Ambient {
                color: Color::from_hex(lighting.ambient_color),
                intensity: lighting.ambient_intensity,
            }),
        ));

        let grid = &config.grid;
        let (center_lines, grid_lines) = geometry::grid_geometry(grid.size, grid.divisions);
        let helper = self.graph.add_to_root(Node::new("GridHelper", NodeKind::Group));
        for (name, lines, color) in [
            ("GridCenter", center_lines, grid.color_center_line),
            ("GridLines", grid_lines, grid.color_grid),
        ] {
            let geometry = self.pool.add_geometry(lines);
            let material = self.pool.add_material(Material::line(Color::from_hex(color), 1.0));
            self.graph.add(helper, Node::new(name, NodeKind::Line { geometry, material }));
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct LabSession<H: HostSurface> {
    config: LabConfig,
    host: H,
    state: SessionState,
    scene: SceneContext,
    capability: Option<RenderCapability>,
    frame: Option<FrameHandle>,
    resize_listener: Option<ListenerId>,
    output: Option<SurfaceId>,
    feedback: Feedback,
    exporter: ExportPipeline,
    commands_tx: Sender<SessionCommand>,
    commands_rx: Receiver<SessionCommand>,
    frames_rendered: u64,
}

impl<H: HostSurface> LabSession<H> {
    pub fn new(config: LabConfig, host: H) -> Self {
        let aspect = host.viewport().aspect();
        let (commands_tx, commands_rx) = mpsc::channel();
        Self {
            scene: SceneContext::new(&config, aspect),
            feedback: Feedback::new(config.ui.clone()),
            exporter: ExportPipeline::new(config.export.clone()),
            config,
            host,
            state: SessionState::Uninitialized,
            capability: None,
            frame: None,
            resize_listener: None,
            output: None,
            commands_tx,
            commands_rx,
            frames_rendered: 0,
        }
    }

    /// Replace the road pathfinder (e.g. to seed or disable the bridge roll).
    pub fn with_pathfinder(mut self, pathfinder: EffortPathfinder) -> Self {
        self.scene.roads = RoadNetwork::new(self.config.road.clone()).with_pathfinder(pathfinder);
        self
    }

    fn require_ready(&self, operation: &'static str) -> Result<(), LabError> {
        if self.state.is_ready() {
            Ok(())
        } else {
            tracing::warn!("Ignoring {}: session is {}", operation, self.state.as_str());
            Err(LabError::InvalidState(self.state.as_str(), "ready"))
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Load the render capability and build the scene.
    ///
    /// When every provider fails the session raises a fatal banner, returns
    /// to `Uninitialized` and reports each attempt.
    pub fn enter(&mut self, loader: &mut CapabilityLoader) -> Result<(), LabError> {
        if self.state != SessionState::Uninitialized {
            return Err(LabError::InvalidState(self.state.as_str(), "uninitialized"));
        }
        self.state = SessionState::DependenciesLoading;

        let viewport = self.host.viewport();
        let capability = match loader.load(viewport.width, viewport.height) {
            Ok(capability) => capability,
            Err(err) => {
                self.feedback.raise_banner(BannerKind::Fatal, format!("{NO_RENDERER_MESSAGE} ({err})"));
                self.state = SessionState::Uninitialized;
                return Err(err);
            }
        };

        self.scene.camera.resize(viewport.width, viewport.height);
        self.scene.populate(&self.config);
        self.output = Some(self.host.attach_output(capability.backend.name()));
        self.resize_listener = Some(self.host.add_resize_listener());
        self.frame = Some(self.host.request_frame());
        tracing::info!(
            "Terrain lab ready ({} via '{}', {}x{})",
            capability.backend.name(),
            capability.provider,
            viewport.width,
            viewport.height
        );
        self.capability = Some(capability);
        self.state = SessionState::Ready { terrain: false };
        Ok(())
    }

    /// Fetch a heightmap and build the terrain.
    ///
    /// Returns `false` (and raises a recoverable banner) when the data is
    /// missing or malformed; the session stays usable without terrain.
    pub fn load_terrain(&mut self, source: &dyn HeightmapSource) -> bool {
        if self.require_ready("terrain load").is_err() {
            return false;
        }
        let field = match source.fetch() {
            Ok(field) => field,
            Err(err) => {
                tracing::warn!("Heightmap from {} rejected: {}", source.describe(), err);
                self.feedback
                    .raise_banner(BannerKind::Recoverable, format!("{NO_TERRAIN_MESSAGE} ({err})"));
                return false;
            }
        };

        let ctx = &mut self.scene;
        let surfaces = mesh_builder::replace(ctx.surfaces.take(), &field, &self.config.terrain, &mut ctx.graph, &mut ctx.pool);
        mesh_builder::apply_mode(&surfaces, ctx.mode, &mut ctx.graph, &mut ctx.pool);
        ctx.surfaces = Some(surfaces);

        let (low, high) = field.range();
        ctx.camera.target = glam::Vec3::new(
            (field.width() - 1) as f32 / 2.0,
            (low + high) / 2.0,
            (field.height() - 1) as f32 / 2.0,
        );
        ctx.field = Some(field);

        self.feedback.clear_banner();
        self.feedback.toast(ToastKind::Success, "Terrain loaded");
        self.state = SessionState::Ready { terrain: true };
        true
    }

    /// React to a host event. Stale frame handles and listeners are ignored.
    pub fn handle_host_event(&mut self, event: HostEvent) {
        if !self.state.is_ready() {
            return;
        }
        match event {
            HostEvent::AnimationFrame(handle) if self.frame == Some(handle) => {
                self.process_commands();
                self.scene.camera.update();
                self.render_frame();
                self.frame = Some(self.host.request_frame());
            }
            HostEvent::Resized(listener, viewport) if self.resize_listener == Some(listener) => {
                self.scene.camera.resize(viewport.width, viewport.height);
                if let Some(capability) = self.capability.as_mut() {
                    capability.backend.resize(viewport.width, viewport.height);
                }
                tracing::debug!("Viewport resized to {}x{}", viewport.width, viewport.height);
            }
            other => tracing::debug!("Ignoring stale host event {:?}", other),
        }
    }

    /// Draw one frame now. Render errors are logged, never returned.
    pub fn render_frame(&mut self) {
        let Some(capability) = self.capability.as_mut() else {
            return;
        };
        for handle in self.scene.pool.take_released() {
            capability.backend.release(handle);
        }
        let ctx = &self.scene;
        let list = DrawList::build(&ctx.graph, &ctx.pool, &ctx.camera, ctx.background);
        match capability.backend.render(&list, &ctx.pool) {
            Ok(()) => self.frames_rendered += 1,
            Err(err) => tracing::warn!("Frame render failed: {}", err),
        }
    }

    /// Tear everything down. Safe to call more than once.
    ///
    /// Each resource is released on its own; failures are logged and the
    /// rest of the teardown still runs.
    pub fn dispose(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }

        if let Some(frame) = self.frame.take() {
            self.host.cancel_frame(frame);
        }
        if let Some(listener) = self.resize_listener.take() {
            self.host.remove_resize_listener(listener);
        }

        let ctx = &mut self.scene;
        ctx.roads.clear(&mut ctx.graph, &mut ctx.pool);
        ctx.areas.clear(&mut ctx.graph, &mut ctx.pool);
        ctx.pois.clear(&mut ctx.graph, &mut ctx.pool);
        if let Some(surfaces) = ctx.surfaces.take() {
            for err in mesh_builder::dispose(&surfaces, &mut ctx.graph, &mut ctx.pool) {
                tracing::warn!("Terrain release failed: {}", err);
            }
        }
        ctx.field = None;

        // Whatever is still attached (lights, grid, strays)
        let root = ctx.graph.root();
        let remaining = ctx.graph.remove(root);
        scene::release_nodes(&remaining, &mut ctx.pool);
        for handle in ctx.pool.live_handles() {
            if let Err(err) = ctx.pool.dispose(handle) {
                tracing::warn!("Failed to release {:?}: {}", handle, err);
            }
        }

        if let Some(mut capability) = self.capability.take() {
            for handle in ctx.pool.take_released() {
                capability.backend.release(handle);
            }
            capability.backend.dispose();
        } else {
            ctx.pool.take_released();
        }
        if let Some(output) = self.output.take() {
            self.host.detach_output(output);
        }

        while self.commands_rx.try_recv().is_ok() {}
        self.state = SessionState::Disposed;
        tracing::info!("Terrain lab disposed after {} frames", self.frames_rendered);
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Sender for UI controls; commands are applied at the next frame.
    pub fn command_sender(&self) -> Sender<SessionCommand> {
        self.commands_tx.clone()
    }

    /// Apply every queued command. Returns how many were applied.
    pub fn process_commands(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands_rx.try_recv() {
            self.submit(command);
            applied += 1;
        }
        applied
    }

    /// Apply one command immediately.
    pub fn submit(&mut self, command: SessionCommand) {
        tracing::debug!("Command {:?}", command);
        match command {
            SessionCommand::AddPoi {
                name,
                kind,
                x,
                z,
                yaw_degrees,
            } => {
                self.add_poi(&name, kind, x, z, yaw_degrees);
            }
            SessionCommand::RemovePoi { index } => {
                self.remove_poi(index);
            }
            SessionCommand::ClearPois => self.clear_pois(),
            SessionCommand::BuildRoad { from, to, style } => {
                self.build_road(from, to, &style);
            }
            SessionCommand::AddArea(spec) => {
                self.add_area(&spec);
            }
            SessionCommand::ApplyLabelStyles(style) => self.apply_label_styles(style),
            SessionCommand::SetVisualizationMode { mode } => self.set_visualization_mode(mode),
            SessionCommand::Orbit { azimuth, elevation } => self.scene.camera.orbit(azimuth, elevation),
            SessionCommand::Zoom { delta } => self.scene.camera.zoom(delta),
        }
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    pub fn add_poi(&mut self, name: &str, kind: PoiKind, x: f32, z: f32, yaw_degrees: f32) -> Option<Poi> {
        self.require_ready("add POI").ok()?;
        let ctx = &mut self.scene;
        let Some(field) = ctx.field.as_ref() else {
            tracing::warn!("Cannot place POI '{}' without terrain", name);
            self.feedback.toast(ToastKind::Error, "Load terrain before placing POIs");
            return None;
        };
        let poi = ctx.pois.add(&mut ctx.graph, &mut ctx.pool, field, name, kind, x, z, yaw_degrees);
        self.feedback.toast(ToastKind::Success, format!("Added {}", poi.name));
        Some(poi)
    }

    /// Remove the POI at `index`. Out-of-range indices are ignored.
    pub fn remove_poi(&mut self, index: usize) -> bool {
        if self.require_ready("remove POI").is_err() {
            return false;
        }
        let ctx = &mut self.scene;
        let removed = ctx.pois.remove_at(&mut ctx.graph, &mut ctx.pool, index);
        if !removed {
            tracing::warn!("No POI at index {}", index);
        }
        removed
    }

    pub fn clear_pois(&mut self) {
        if self.require_ready("clear POIs").is_err() {
            return;
        }
        let ctx = &mut self.scene;
        ctx.pois.clear(&mut ctx.graph, &mut ctx.pool);
        self.feedback.toast(ToastKind::Info, "Cleared all POIs");
    }

    /// Build a road between the POIs at `from` and `to`.
    pub fn build_road(&mut self, from: usize, to: usize, style: &RoadStyleSpec) -> Option<Road> {
        self.require_ready("build road").ok()?;
        let ctx = &mut self.scene;
        match ctx
            .roads
            .build(&mut ctx.graph, &mut ctx.pool, ctx.field.as_ref(), &ctx.pois, from, to, style)
        {
            Ok(road) => {
                self.feedback
                    .toast(ToastKind::Success, format!("Road built ({} points)", road.path.len()));
                Some(road)
            }
            Err(err) => {
                tracing::warn!("Road rejected: {}", err);
                self.feedback.toast(ToastKind::Error, err.to_string());
                None
            }
        }
    }

    /// Remove one road and release its line. Unknown ids are ignored.
    pub fn remove_road(&mut self, id: RoadId) -> bool {
        if self.require_ready("remove road").is_err() {
            return false;
        }
        let ctx = &mut self.scene;
        let removed = ctx.roads.remove(&mut ctx.graph, &mut ctx.pool, id);
        if !removed {
            tracing::warn!("No road with id {:?}", id);
        }
        removed
    }

    pub fn add_area(&mut self, spec: &AreaSpec) -> Option<Area> {
        self.require_ready("add area").ok()?;
        let ctx = &mut self.scene;
        let Some(field) = ctx.field.as_ref() else {
            tracing::warn!("Cannot paint area '{}' without terrain", spec.name);
            self.feedback.toast(ToastKind::Error, "Load terrain before painting areas");
            return None;
        };
        let area = ctx.areas.add(&mut ctx.graph, &mut ctx.pool, field, spec);
        self.feedback.toast(ToastKind::Success, format!("Added area {}", area.name));
        Some(area)
    }

    pub fn apply_label_styles(&mut self, style: LabelStyle) {
        if self.require_ready("label restyle").is_err() {
            return;
        }
        let ctx = &mut self.scene;
        ctx.pois.apply_label_styles(&mut ctx.graph, &mut ctx.pool, style);
    }

    /// Switch between the solid surface and the wire overlay.
    pub fn set_visualization_mode(&mut self, mode: VisualizationMode) {
        let ctx = &mut self.scene;
        ctx.mode = mode;
        if let Some(surfaces) = ctx.surfaces.as_ref() {
            mesh_builder::apply_mode(surfaces, mode, &mut ctx.graph, &mut ctx.pool);
        }
        tracing::info!("Visualization mode: {:?}", mode);
    }

    /// Export the current view into `dir`.
    pub fn export(&mut self, kind: ExportKind, dir: &Path) -> Result<PathBuf, LabError> {
        self.require_ready("export")?;
        if kind == ExportKind::Png {
            self.render_frame();
        }
        let viewport = self.host.viewport();
        let backend: Option<&mut dyn RenderBackend> = match self.capability.as_mut() {
            Some(capability) => Some(capability.backend.as_mut()),
            None => None,
        };
        let ctx = &self.scene;
        let scene = ExportScene {
            graph: &ctx.graph,
            resources: &ctx.pool,
            camera: &ctx.camera,
            viewport: (viewport.width, viewport.height),
            background: ctx.background,
            backend,
        };
        match self.exporter.export(kind, scene, dir) {
            Ok(path) => {
                self.feedback
                    .toast(ToastKind::Success, format!("Exported {}", path.display()));
                Ok(path)
            }
            Err(err) => {
                tracing::warn!("{:?} export failed: {}", kind, err);
                self.feedback.toast(ToastKind::Error, format!("Export failed: {err}"));
                Err(err.into())
            }
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    pub fn pois(&self) -> Vec<Poi> {
        self.scene.pois.list()
    }

    pub fn roads(&self) -> Vec<Road> {
        self.scene.roads.list()
    }

    pub fn areas(&self) -> Vec<Area> {
        self.scene.areas.list()
    }

    pub fn heightfield(&self) -> Option<&HeightField> {
        self.scene.field.as_ref()
    }

    pub fn visualization_mode(&self) -> VisualizationMode {
        self.scene.mode
    }

    /// Live geometries, materials and textures owned by this session.
    pub fn tracked_resources(&self) -> ResourceCounts {
        self.scene.pool.counts()
    }

    /// Name of the provider that supplied the renderer.
    pub fn renderer_provider(&self) -> Option<&str> {
        self.capability.as_ref().map(|c| c.provider.as_str())
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut Feedback {
        &mut self.feedback
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: HostSurface> Drop for LabSession<H> {
    fn drop(&mut self) {
        self.dispose();
    }
}
