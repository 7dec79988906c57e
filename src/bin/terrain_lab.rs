//! Terrain Lab CLI
//!
//! Run with: `cargo run --bin terrain_lab -- --heightmap map.json --export png,obj,svg`
//!
//! Runs one headless lab session: loads the renderer, builds the terrain,
//! applies a command script, pumps frames and writes the requested exports.
//!
//! A script is a JSON array of commands, for example:
//!
//! ```json
//! [
//!   {"type": "add_poi", "name": "HQ", "kind": "building", "x": 10, "z": 12},
//!   {"type": "add_poi", "name": "Depot", "kind": "building", "x": 40, "z": 30},
//!   {"type": "build_road", "from": 0, "to": 1},
//!   {"type": "add_area", "shape": "circle", "pattern": "dots", "x": 25, "z": 25, "size": 12}
//! ]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use terrain_lab_engine::config::LabConfig;
use terrain_lab_engine::export::ExportKind;
use terrain_lab_engine::pathfinding::{BridgeRoll, EffortCost, EffortPathfinder};
use terrain_lab_engine::render::CapabilityLoader;
use terrain_lab_engine::session::{HeadlessHost, LabSession, SessionCommand};
use terrain_lab_engine::terrain::{JsonFileSource, VisualizationMode};

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "terrain_lab")]
#[command(about = "Render a heightmap with POIs, roads and areas, then export it")]
#[command(version)]
struct Args {
    /// Heightmap JSON (`{"width", "height", "z"}`, optionally under "heightmap")
    #[arg(long)]
    heightmap: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON command script applied after the terrain loads
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Output directory for exports
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Frames to pump before exporting
    #[arg(long, default_value = "3")]
    frames: u32,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    /// Skip wgpu and use the CPU rasterizer
    #[arg(long)]
    software: bool,

    /// Seed for the road bridge penalty (reproducible roads)
    #[arg(long)]
    seed: Option<u64>,

    /// Show the wire overlay instead of the solid surface
    #[arg(long)]
    contours: bool,

    /// Comma separated exports: png, obj, svg
    #[arg(long, value_delimiter = ',', default_value = "png")]
    export: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,wgpu=warn,naga=warn")
    } else {
        EnvFilter::new("info,wgpu=warn,naga=warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let config = match &args.config {
        Some(path) => LabConfig::load(path).map_err(|e| e.to_string())?,
        None => LabConfig::default(),
    };

    let exports: Vec<ExportKind> = args
        .export
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| ExportKind::from_name(name).ok_or_else(|| format!("unknown export kind '{name}'")))
        .collect::<Result<_, _>>()?;

    let commands = match &args.script {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            SessionCommand::parse_script(&text).map_err(|e| format!("invalid script {}: {e}", path.display()))?
        }
        None => Vec::new(),
    };

    let mut session = LabSession::new(config, HeadlessHost::new(args.width, args.height));
    if let Some(seed) = args.seed {
        let cost = EffortCost::from_config(&session.config().road);
        session = session.with_pathfinder(EffortPathfinder::new(cost, BridgeRoll::Seeded(seed)));
    }

    let mut loader = if args.software {
        CapabilityLoader::software_only()
    } else {
        CapabilityLoader::default()
    };
    session.enter(&mut loader).map_err(|e| e.to_string())?;

    if !session.load_terrain(&JsonFileSource::new(&args.heightmap)) {
        tracing::warn!("Continuing without terrain");
    }
    if args.contours {
        session.set_visualization_mode(VisualizationMode::Contours);
    }

    let sender = session.command_sender();
    for command in commands {
        sender.send(command).map_err(|e| e.to_string())?;
    }

    let mut frames = 0;
    while frames < args.frames.max(1) {
        let Some(event) = session.host_mut().poll_event() else {
            break;
        };
        session.handle_host_event(event);
        frames = session.frames_rendered() as u32;
    }

    for toast in session.feedback_mut().drain_toasts() {
        tracing::info!("[{:?}] {}", toast.kind, toast.message);
    }
    tracing::info!(
        "{} POIs, {} roads, {} areas",
        session.pois().len(),
        session.roads().len(),
        session.areas().len()
    );

    std::fs::create_dir_all(&args.out).map_err(|e| format!("failed to create {}: {e}", args.out.display()))?;
    let mut failed = false;
    for kind in exports {
        if let Err(err) = session.export(kind, &args.out) {
            tracing::error!("{:?} export failed: {}", kind, err);
            failed = true;
        }
    }

    session.dispose();
    if failed {
        Err("one or more exports failed".to_string())
    } else {
        Ok(())
    }
}
