//! Session Tests - Lifecycle, Operations and Teardown
//!
//! Drives a headless [`LabSession`] on the software renderer through the
//! flows a UI would: enter, load terrain, place POIs, build roads, paint
//! areas, export and dispose.

use serde_json::json;
use terrain_lab_engine::config::LabConfig;
use terrain_lab_engine::error::{LabError, ProviderError};
use terrain_lab_engine::export::ExportKind;
use terrain_lab_engine::overlay::{AreaPattern, AreaShape, AreaSpec, RoadStyleSpec};
use terrain_lab_engine::pathfinding::{BridgeRoll, EffortCost, EffortPathfinder};
use terrain_lab_engine::poi::PoiKind;
use terrain_lab_engine::render::{CapabilityLoader, RenderBackend, RenderProvider};
use terrain_lab_engine::session::{
    BannerKind, FrameHandle, HeadlessHost, HostEvent, LabSession, SessionCommand, SessionState,
};
use terrain_lab_engine::terrain::{HeightField, StaticSource, VisualizationMode};

// ============================================================================
// Helpers
// ============================================================================

fn session(width: u32, height: u32) -> LabSession<HeadlessHost> {
    let pathfinder = EffortPathfinder::new(EffortCost::default(), BridgeRoll::Disabled);
    let mut session =
        LabSession::new(LabConfig::default(), HeadlessHost::new(width, height)).with_pathfinder(pathfinder);
    session.enter(&mut CapabilityLoader::software_only()).unwrap();
    session
}

fn hills() -> StaticSource {
    let field = HeightField::from_fn(24, 24, |x, z| ((x as f32 * 0.4).sin() + (z as f32 * 0.3).cos()) * 2.0).unwrap();
    StaticSource::from_field(&field)
}

fn node_names(session: &LabSession<HeadlessHost>) -> Vec<String> {
    let graph = &session.scene().graph;
    graph
        .traverse(graph.root())
        .into_iter()
        .filter_map(|id| graph.get(id).map(|n| n.name.clone()))
        .collect()
}

fn pump(session: &mut LabSession<HeadlessHost>) {
    while let Some(event) = session.host_mut().poll_event() {
        let before = session.frames_rendered();
        session.handle_host_event(event);
        if session.frames_rendered() > before {
            break;
        }
    }
}

struct FailingProvider(&'static str);

impl RenderProvider for FailingProvider {
    fn name(&self) -> &str {
        self.0
    }

    fn load(&self, _width: u32, _height: u32) -> Result<Box<dyn RenderBackend>, ProviderError> {
        Err(ProviderError::Unavailable(format!("{} is switched off", self.0)))
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_enter_wires_host() {
    let session = session(64, 48);
    assert_eq!(session.state(), SessionState::Ready { terrain: false });
    assert_eq!(session.renderer_provider(), Some("software"));
    assert_eq!(session.host().listener_count(), 1);
    assert_eq!(session.host().attached_outputs(), 1);
    assert_eq!(session.host().pending_frames(), 1);

    let names = node_names(&session);
    for expected in ["DirectionalLight", "AmbientLight", "GridHelper", "GridCenter", "GridLines"] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
}

#[test]
fn test_no_capability_reverts_to_uninitialized() {
    let mut session = LabSession::new(LabConfig::default(), HeadlessHost::new(32, 32));
    let mut loader = CapabilityLoader::new(vec![
        Box::new(FailingProvider("gpu")),
        Box::new(FailingProvider("gpu-fallback")),
    ]);

    let attempts = match session.enter(&mut loader) {
        Err(LabError::NoRenderCapability { attempts }) => attempts,
        other => panic!("unexpected result {other:?}"),
    };
    assert_eq!(attempts.len(), 2);
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(session.feedback().banner().map(|b| b.kind), Some(BannerKind::Fatal));
    assert_eq!(session.host().listener_count(), 0);

    // Operations need a ready session
    assert!(session.add_poi("HQ", PoiKind::Building, 1.0, 1.0, 0.0).is_none());
    assert!(matches!(
        session.export(ExportKind::Obj, std::env::temp_dir().as_path()),
        Err(LabError::InvalidState(..))
    ));
}

#[test]
fn test_empty_heightmap_keeps_session_usable() {
    let mut session = session(32, 32);
    let loaded = session.load_terrain(&StaticSource::new(json!({ "width": 3, "height": 3, "z": [] })));

    assert!(!loaded);
    assert_eq!(session.state(), SessionState::Ready { terrain: false });
    assert_eq!(session.feedback().banner().map(|b| b.kind), Some(BannerKind::Recoverable));
    assert!(!node_names(&session).iter().any(|n| n == "Terrain"));
    assert!(session.heightfield().is_none());

    // The loop keeps going without terrain
    pump(&mut session);
    assert_eq!(session.frames_rendered(), 1);
}

#[test]
fn test_terrain_load_clears_banner() {
    let mut session = session(32, 32);
    session.load_terrain(&StaticSource::empty());
    assert!(session.feedback().banner().is_some());

    assert!(session.load_terrain(&hills()));
    assert!(session.feedback().banner().is_none());
    assert_eq!(session.state(), SessionState::Ready { terrain: true });
    assert!(node_names(&session).iter().any(|n| n == "Terrain"));
}

#[test]
fn test_stale_frame_handles_are_ignored() {
    let mut session = session(32, 32);
    let Some(HostEvent::AnimationFrame(first)) = session.host_mut().poll_event() else {
        panic!("expected a frame request");
    };
    session.handle_host_event(HostEvent::AnimationFrame(first));
    assert_eq!(session.frames_rendered(), 1);

    session.handle_host_event(HostEvent::AnimationFrame(first));
    session.handle_host_event(HostEvent::AnimationFrame(FrameHandle(9_999)));
    assert_eq!(session.frames_rendered(), 1);
    assert_eq!(session.host().pending_frames(), 1);
}

#[test]
fn test_dispose_releases_everything() {
    let mut session = session(48, 48);
    assert!(session.load_terrain(&hills()));

    for (i, (x, z)) in [(2.0, 2.0), (20.0, 4.0), (12.0, 20.0), (4.0, 16.0)].into_iter().enumerate() {
        let kind = if i == 3 { PoiKind::Vehicle } else { PoiKind::Building };
        assert!(session.add_poi(&format!("P{i}"), kind, x, z, 15.0).is_some());
    }
    assert!(session.build_road(0, 1, &RoadStyleSpec::default()).is_some());
    assert!(session.build_road(1, 2, &RoadStyleSpec::default()).is_some());
    for (shape, pattern) in [(AreaShape::Circle, AreaPattern::Dots), (AreaShape::Square, AreaPattern::Lines)] {
        let spec = AreaSpec {
            shape,
            pattern,
            ..AreaSpec::default()
        };
        assert!(session.add_area(&spec).is_some());
    }
    pump(&mut session);
    assert!(session.tracked_resources().total() > 0);

    session.dispose();
    assert_eq!(session.state(), SessionState::Disposed);
    assert_eq!(session.tracked_resources().total(), 0);
    assert!(session.scene().graph.is_empty());
    assert_eq!(session.host().listener_count(), 0);
    assert_eq!(session.host().attached_outputs(), 0);
    assert_eq!(session.host().pending_frames(), 0);
    assert!(session.pois().is_empty() && session.roads().is_empty() && session.areas().is_empty());

    session.dispose();
    assert_eq!(session.state(), SessionState::Disposed);
}

// ============================================================================
// Operations
// ============================================================================

#[test]
fn test_three_by_three_road() {
    let mut session = session(32, 32);
    assert!(session.load_terrain(&StaticSource::new(json!({
        "width": 3,
        "height": 3,
        "z": [0, 0, 0, 0, 0, 0, 0, 0, 0]
    }))));
    session.add_poi("A", PoiKind::Building, 0.0, 0.0, 0.0).unwrap();
    session.add_poi("B", PoiKind::Building, 2.0, 2.0, 0.0).unwrap();

    let road = session.build_road(0, 1, &RoadStyleSpec::default()).unwrap();
    assert!(road.path.len() >= 3);
    assert_eq!(road.path, vec![(0, 0), (1, 1), (2, 2)]);
    assert_eq!(session.roads().len(), 1);
}

#[test]
fn test_remove_road_releases_line() {
    let mut session = session(32, 32);
    assert!(session.load_terrain(&hills()));
    session.add_poi("A", PoiKind::Building, 2.0, 2.0, 0.0).unwrap();
    session.add_poi("B", PoiKind::Building, 12.0, 9.0, 0.0).unwrap();
    let before = session.tracked_resources();

    let road = session.build_road(0, 1, &RoadStyleSpec::default()).unwrap();
    assert!(node_names(&session).contains(&"road:A-B".to_string()));

    assert!(session.remove_road(road.id));
    assert!(session.roads().is_empty());
    assert!(!node_names(&session).iter().any(|n| n.starts_with("road:")));
    assert_eq!(session.tracked_resources(), before);
    assert!(!session.remove_road(road.id));
}

#[test]
fn test_road_needs_two_buildings() {
    let mut session = session(32, 32);
    assert!(session.load_terrain(&hills()));
    session.add_poi("Depot", PoiKind::Building, 3.0, 3.0, 0.0).unwrap();
    session.add_poi("Truck", PoiKind::Vehicle, 10.0, 10.0, 0.0).unwrap();
    session.feedback_mut().drain_toasts();

    assert!(session.build_road(0, 1, &RoadStyleSpec::default()).is_none());
    assert!(session.build_road(0, 0, &RoadStyleSpec::default()).is_none());
    assert!(session.build_road(0, 7, &RoadStyleSpec::default()).is_none());
    assert!(session.roads().is_empty());
    assert_eq!(session.feedback_mut().drain_toasts().len(), 3);
}

#[test]
fn test_clear_pois_removes_markers() {
    let mut session = session(32, 32);
    assert!(session.load_terrain(&hills()));
    session.add_poi("North", PoiKind::Air, 5.0, 5.0, 0.0).unwrap();
    session.add_poi("South", PoiKind::Building, 15.0, 15.0, 90.0).unwrap();
    let before = session.tracked_resources().total();

    session.clear_pois();
    assert!(session.pois().is_empty());
    assert!(session.tracked_resources().total() < before);
    let names = node_names(&session);
    assert!(
        !names
            .iter()
            .any(|n| n.starts_with("poi:") || n.starts_with("label:") || n == "connector"),
        "leftover nodes: {names:?}"
    );
}

#[test]
fn test_remove_poi_by_index() {
    let mut session = session(32, 32);
    assert!(session.load_terrain(&hills()));
    session.add_poi("One", PoiKind::Building, 2.0, 2.0, 0.0).unwrap();
    session.add_poi("Two", PoiKind::Building, 8.0, 8.0, 0.0).unwrap();

    assert!(session.remove_poi(0));
    assert!(!session.remove_poi(5));
    let names: Vec<String> = session.pois().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Two".to_string()]);
    assert!(!node_names(&session).iter().any(|n| n == "poi:One"));
}

#[test]
fn test_poi_without_terrain_is_rejected() {
    let mut session = session(32, 32);
    assert!(session.add_poi("Lost", PoiKind::Building, 1.0, 1.0, 0.0).is_none());
    assert!(session.add_area(&AreaSpec::default()).is_none());
    assert!(session.pois().is_empty() && session.areas().is_empty());
}

#[test]
fn test_visualization_mode_toggle() {
    let mut session = session(32, 32);
    assert!(session.load_terrain(&hills()));
    let surfaces = session.scene().surfaces.unwrap();
    let solid_visible = |s: &LabSession<HeadlessHost>| s.scene().pool.material(surfaces.solid_material).unwrap().visible;
    let wire_visible = |s: &LabSession<HeadlessHost>| s.scene().graph.get(surfaces.wire).unwrap().visible;

    assert!(solid_visible(&session) && !wire_visible(&session));

    session.set_visualization_mode(VisualizationMode::Contours);
    assert!(!solid_visible(&session) && wire_visible(&session));
    assert_eq!(session.visualization_mode(), VisualizationMode::Contours);

    session.set_visualization_mode(VisualizationMode::Mesh);
    assert!(solid_visible(&session) && !wire_visible(&session));
}

#[test]
fn test_commands_apply_on_next_frame() {
    let mut session = session(32, 32);
    assert!(session.load_terrain(&hills()));
    let sender = session.command_sender();
    sender
        .send(SessionCommand::AddPoi {
            name: "Queued".to_string(),
            kind: PoiKind::Building,
            x: 6.0,
            z: 6.0,
            yaw_degrees: 0.0,
        })
        .unwrap();
    sender
        .send(SessionCommand::SetVisualizationMode {
            mode: VisualizationMode::Contours,
        })
        .unwrap();
    assert!(session.pois().is_empty());

    pump(&mut session);
    assert_eq!(session.pois().len(), 1);
    assert_eq!(session.visualization_mode(), VisualizationMode::Contours);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_exports_follow_viewport() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(40, 30);
    assert!(session.load_terrain(&hills()));
    session.add_poi("HQ", PoiKind::Building, 4.0, 4.0, 0.0).unwrap();

    session.host_mut().resize(50, 20);
    pump(&mut session);
    while let Some(event) = session.host_mut().poll_event() {
        session.handle_host_event(event);
        if matches!(event, HostEvent::Resized(..)) {
            break;
        }
    }

    let png = session.export(ExportKind::Png, dir.path()).unwrap();
    let image = image::open(&png).unwrap();
    assert_eq!((image.width(), image.height()), (50, 20));

    let obj = session.export(ExportKind::Obj, dir.path()).unwrap();
    let text = std::fs::read_to_string(obj).unwrap();
    assert!(text.contains("o Terrain"));
    assert!(text.lines().any(|l| l.starts_with("f ")));

    let svg = session.export(ExportKind::Svg, dir.path()).unwrap();
    let markup = std::fs::read_to_string(svg).unwrap();
    assert!(markup.starts_with("<svg") || markup.starts_with("<?xml"));
    assert!(markup.contains("width=\"50\""));
}
