//! Session Commands
//!
//! Messages that UI controls (or a script) send to a session. They travel
//! over the session's own channel and are applied between frames.

use serde::{Deserialize, Serialize};

use crate::overlay::{AreaSpec, RoadStyleSpec};
use crate::poi::{LabelStyle, PoiKind};
use crate::terrain::VisualizationMode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionCommand {
    AddPoi {
        #[serde(default)]
        name: String,
        kind: PoiKind,
        x: f32,
        z: f32,
        #[serde(default)]
        yaw_degrees: f32,
    },
    RemovePoi {
        index: usize,
    },
    ClearPois,
    BuildRoad {
        from: usize,
        to: usize,
        #[serde(default)]
        style: RoadStyleSpec,
    },
    AddArea(AreaSpec),
    ApplyLabelStyles(LabelStyle),
    SetVisualizationMode {
        mode: VisualizationMode,
    },
    Orbit {
        azimuth: f32,
        elevation: f32,
    },
    Zoom {
        delta: f32,
    },
}

impl SessionCommand {
    /// Parse a JSON array of commands.
    pub fn parse_script(json: &str) -> Result<Vec<SessionCommand>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{AreaPattern, AreaShape};

    #[test]
    fn test_parse_script() {
        let script = r##"[
            {"type": "add_poi", "name": "HQ", "kind": "building", "x": 4, "z": 5},
            {"type": "remove_poi", "index": 0},
            {"type": "clear_pois"},
            {"type": "build_road", "from": 0, "to": 1, "style": {"color": "#00ff00"}},
            {"type": "add_area", "shape": "circle", "pattern": "dots", "size": 12},
            {"type": "apply_label_styles", "bold": false, "connector": "dashed"},
            {"type": "set_visualization_mode", "mode": "contours"},
            {"type": "zoom", "delta": 2.5}
        ]"##;
        let commands = SessionCommand::parse_script(script).unwrap();
        assert_eq!(commands.len(), 8);
        assert_eq!(
            commands[0],
            SessionCommand::AddPoi {
                name: "HQ".to_string(),
                kind: PoiKind::Building,
                x: 4.0,
                z: 5.0,
                yaw_degrees: 0.0,
            }
        );
        let SessionCommand::AddArea(area) = &commands[4] else {
            panic!("expected area");
        };
        assert_eq!((area.shape, area.pattern, area.size), (AreaShape::Circle, AreaPattern::Dots, 12.0));
        assert_eq!(area.name, "Area");
        let SessionCommand::ApplyLabelStyles(style) = &commands[5] else {
            panic!("expected label style");
        };
        assert!(!style.bold && style.background);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(SessionCommand::parse_script(r#"[{"type": "explode"}]"#).is_err());
    }
}
