//! camwatchd - multi-camera object detection overlay daemon
//!
//! This daemon:
//! 1. Loads settings (file, then environment overrides)
//! 2. Loads the detection model and labels
//! 3. Discovers the NVR's cameras (or takes them from the command line)
//! 4. Streams every camera on its own worker, keeping only the newest frame
//! 5. Annotates fresh frames and presents them per camera until 'q' or Ctrl-C

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use camwatch::camera::{self, CameraHandle};
use camwatch::cancel::{self, CancellationToken};
use camwatch::display::{Display, ImageDirDisplay, LogDisplay};
use camwatch::{
    CamwatchConfig, DetectionEngine, EngineSettings, Labels, NvrConnector, Orchestrator,
    OrchestratorSettings, Overlay, StubBackend,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Overlay object detections on NVR camera streams"
)]
struct Cli {
    /// Path to the JSON settings file.
    #[arg(long, global = true, env = "CAMWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream cameras and overlay detections (default).
    Run(RunArgs),
    /// List the cameras the NVR reports, with their online status.
    List,
    /// Save one still image from a camera.
    Snapshot {
        /// Camera id as reported by `list`.
        #[arg(long, required_unless_present = "name", conflicts_with = "name")]
        id: Option<u32>,
        /// Camera name as reported by `list`, matched exactly.
        #[arg(long)]
        name: Option<String>,
        /// Output image path; the format follows the extension.
        #[arg(long, default_value = "snapshot.jpg")]
        out: PathBuf,
    },
    /// Write a settings file filled with defaults.
    InitConfig {
        #[arg(long, default_value = "settings.json")]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Run without a model; every frame yields an empty detection set.
    #[arg(long, env = "CAMWATCH_STUB_DETECTOR")]
    stub_detector: bool,

    /// Watch these cameras instead of discovering them, as NAME=URL
    /// (e.g. porch=stub://porch). Repeatable.
    #[arg(long = "camera", value_name = "NAME=URL")]
    cameras: Vec<String>,

    /// Include cameras that fail the online check.
    #[arg(long)]
    all: bool,

    /// Write annotated images here instead of the configured output dir.
    #[arg(long, env = "CAMWATCH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::InitConfig { path, force }) => init_config(&path, force),
        Some(Command::List) => list(&load_config(cli.config.as_deref())?),
        Some(Command::Snapshot { id, name, out }) => {
            let config = load_config(cli.config.as_deref())?;
            let id = match (id, name) {
                (Some(id), _) => id,
                (None, Some(name)) => {
                    camera::find_by_name(&config.nvr, &name)
                        .ok_or_else(|| anyhow!("no camera named {:?}", name))?
                        .id
                }
                (None, None) => return Err(anyhow!("either --id or --name is required")),
            };
            snapshot(&config, id, &out)
        }
        Some(Command::Run(args)) => run(load_config(cli.config.as_deref())?, args),
        None => run(load_config(cli.config.as_deref())?, RunArgs::default()),
    }
}

fn load_config(path: Option<&Path>) -> Result<CamwatchConfig> {
    CamwatchConfig::load_from(path).context("failed to load settings")
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    CamwatchConfig::write_default(path)?;
    log::info!("default settings written to {}", path.display());
    Ok(())
}

fn list(config: &CamwatchConfig) -> Result<()> {
    let cameras = camera::get_cameras(&config.nvr);
    if cameras.is_empty() {
        log::warn!("no cameras discovered at {}", config.nvr.host);
    }
    for handle in cameras {
        let online = camera::discovery::is_online(&config.nvr, handle.id);
        println!(
            "{:>4}  {:<24} {}",
            handle.id,
            handle.name,
            if online { "online" } else { "offline" }
        );
    }
    Ok(())
}

fn snapshot(config: &CamwatchConfig, id: u32, out: &Path) -> Result<()> {
    let frame = camera::fetch_snapshot(&config.nvr, id)
        .ok_or_else(|| anyhow!("no snapshot from camera {}", id))?;
    let image = frame
        .into_image()
        .ok_or_else(|| anyhow!("camera {} returned a malformed image", id))?;
    image
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    log::info!("camera {} snapshot saved to {}", id, out.display());
    Ok(())
}

fn run(mut config: CamwatchConfig, args: RunArgs) -> Result<()> {
    if let Some(dir) = args.output_dir {
        config.display.output_dir = Some(dir);
    }

    let engine = if args.stub_detector {
        log::warn!("running with the stub detector; no objects will be found");
        let labels = Labels::load(&config.model.labels).unwrap_or_default();
        DetectionEngine::new(
            Box::new(StubBackend::new()),
            labels,
            EngineSettings::from(&config.model),
        )
    } else {
        DetectionEngine::load(&config.model).context("failed to load detection model")?
    };

    let cameras = if args.cameras.is_empty() {
        discover(&config, args.all)
    } else {
        args.cameras
            .iter()
            .enumerate()
            .map(|(idx, spec)| parse_camera_arg(idx as u32 + 1, spec))
            .collect::<Result<Vec<_>>>()?
    };
    if cameras.is_empty() {
        return Err(anyhow!("no cameras to watch"));
    }
    for handle in &cameras {
        log::info!("registered {}", handle);
    }

    let display: Box<dyn Display> = match &config.display.output_dir {
        Some(dir) => {
            log::info!("writing annotated frames to {}", dir.display());
            Box::new(ImageDirDisplay::new(dir)?)
        }
        None => Box::new(LogDisplay::new()),
    };
    let overlay = match &config.display.font_path {
        Some(path) => Overlay::with_font(path)?,
        None => Overlay::new(),
    };
    if !overlay.has_captions() {
        log::info!("no display.font_path set; drawing boxes without captions");
    }

    let token = CancellationToken::new();
    cancel::install_ctrlc(&token)?;
    cancel::spawn_stdin_listener(config.display.quit_key, token.clone())?;
    log::info!(
        "press '{}' then Enter, or Ctrl-C, to stop",
        config.display.quit_key
    );

    let connector = NvrConnector::new(config.nvr.clone(), config.capture.clone());
    let mut orchestrator = Orchestrator::new(
        engine,
        Box::new(connector),
        display,
        OrchestratorSettings::from(&config),
    )
    .with_overlay(overlay)
    .with_cancellation(token);

    let summary = orchestrator.run(cameras);
    for report in &summary.cameras {
        log::info!(
            "{}: {} frames shown, {} detections, {:?}",
            report.name,
            report.frames_shown,
            report.detections,
            report.outcome
        );
    }
    log::info!("camwatchd stopped ({:?})", summary.reason);
    Ok(())
}

fn discover(config: &CamwatchConfig, include_offline: bool) -> Vec<CameraHandle> {
    if include_offline {
        camera::get_cameras(&config.nvr)
    } else {
        camera::available_cameras(&config.nvr)
    }
}

fn parse_camera_arg(id: u32, spec: &str) -> Result<CameraHandle> {
    let (name, url) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("--camera expects NAME=URL, got '{}'", spec))?;
    if name.trim().is_empty() || url.trim().is_empty() {
        return Err(anyhow!("--camera expects NAME=URL, got '{}'", spec));
    }
    Ok(CameraHandle::new(id, name.trim(), url.trim()))
}
