//! Binary entrypoint for the lapor kiosk.
//!
//! Wires the real device adapters to the capture pipeline; all pipeline
//! logic lives in the library crate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use lapor_kiosk::config::Configuration;
use lapor_kiosk::device::camera::CommandCamera;
use lapor_kiosk::device::sensor::GpsdSensor;
use lapor_kiosk::device::{LocationSensor, StillCamera};
use lapor_kiosk::draft::Category;
use lapor_kiosk::events::{DraftSnapshot, IncomingFile};
use lapor_kiosk::metadata::ExifDecoder;
use lapor_kiosk::previews::{DiskPreviewStore, NullPreviewStore, PreviewStore};
use lapor_kiosk::session::{FileSessionStore, SessionStore};
use lapor_kiosk::submit::HttpTransport;
use lapor_kiosk::tasks::intake::{self, IntakeDeps, IntakeHandle, IntakeSettings};

#[derive(Debug, Parser)]
#[command(name = "lapor-kiosk", about = "Field kiosk for capturing incident reports")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture evidence and submit one report.
    Report(ReportArgs),
    /// Probe the camera, sensor, session and preview storage.
    Doctor,
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// Grab this many stills from the camera before attaching files.
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    camera: u32,

    /// Image files to attach; the first one's metadata locks the location
    /// unless a camera capture locked it first.
    #[arg(long = "photo", value_name = "FILE")]
    photos: Vec<PathBuf>,

    /// Report description.
    #[arg(long)]
    description: String,

    /// Report category (sampah, jalan_rusak, banjir, lainnya).
    #[arg(long)]
    category: Category,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("lapor_kiosk={}", level).parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("invalid configuration values")?;

    match cli.command {
        Command::Report(args) => run_report(cfg, args).await,
        Command::Doctor => run_doctor(cfg).await,
    }
}

async fn run_report(cfg: Configuration, args: ReportArgs) -> Result<()> {
    // The one-shot CLI has no display surface, so previews have nothing to
    // show; the null store keeps the handle lifecycle without disk churn.
    let previews: Arc<dyn PreviewStore> = Arc::new(NullPreviewStore::default());
    let deps = IntakeDeps {
        camera: Arc::new(CommandCamera::new(
            cfg.camera.devices.clone(),
            cfg.camera.capture_timeout,
        )),
        sensor: Arc::new(GpsdSensor::new(cfg.sensor.gpsd_address.clone())),
        decoder: Arc::new(ExifDecoder),
        previews,
        transport: Arc::new(
            HttpTransport::new(cfg.api.submit_endpoint(), cfg.api.request_timeout)
                .context("building report transport")?,
        ),
        session: Arc::new(FileSessionStore::new(cfg.session.path.clone())),
        settings: IntakeSettings {
            facing: cfg.camera.prefer_facing,
            fix_timeout: cfg.sensor.fix_timeout,
            high_accuracy: cfg.sensor.high_accuracy,
        },
    };

    let (command_tx, command_rx) = mpsc::channel(16); // CLI -> intake
    let (snapshot_tx, _snapshot_rx) = watch::channel(DraftSnapshot::default());
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let intake_task = tokio::spawn(intake::run(deps, command_rx, snapshot_tx, cancel.clone()));
    let handle = IntakeHandle::new(command_tx);

    let outcome = drive_report(&handle, &args).await;

    cancel.cancel();
    match intake_task.await {
        Ok(result) => result.context("intake task failed")?,
        Err(err) => tracing::error!("join error: {err}"),
    }
    outcome
}

/// Runs the capture sequence against the intake task. Kept separate from the
/// spawn/teardown plumbing so every early return still shuts the task down.
async fn drive_report(handle: &IntakeHandle, args: &ReportArgs) -> Result<()> {
    if args.camera > 0 {
        handle.open_camera().await.context("opening camera")?;
        for n in 0..args.camera {
            handle
                .capture_still()
                .await
                .with_context(|| format!("capturing still {}", n + 1))?;
        }
        handle.close_camera().await.context("closing camera")?;
    }

    if !args.photos.is_empty() {
        let mut files = Vec::with_capacity(args.photos.len());
        for path in &args.photos {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo".to_string());
            files.push(IncomingFile { name, bytes });
        }
        handle.upload(files).await.context("attaching photos")?;
    }

    handle
        .set_description(args.description.clone())
        .await
        .context("setting description")?;
    handle
        .set_category(Some(args.category))
        .await
        .context("setting category")?;
    handle.submit().await.context("submitting report")?;
    info!("report submitted");
    Ok(())
}

async fn run_doctor(cfg: Configuration) -> Result<()> {
    let camera = CommandCamera::new(cfg.camera.devices.clone(), cfg.camera.capture_timeout);
    match camera.open(cfg.camera.prefer_facing).await {
        Ok(stream) => {
            println!("camera:   ok");
            drop(stream);
        }
        Err(err) => println!("camera:   {err}"),
    }

    let sensor = GpsdSensor::new(cfg.sensor.gpsd_address.clone());
    match sensor
        .get_fix(cfg.sensor.fix_timeout, cfg.sensor.high_accuracy)
        .await
    {
        Ok(fix) => println!("sensor:   fix at {}, {}", fix.lat, fix.lon),
        Err(err) => println!("sensor:   {err}"),
    }

    let session = FileSessionStore::new(cfg.session.path.clone());
    match session.current() {
        Some(submitter) => println!("session:  signed in as {}", submitter.id),
        None => println!("session:  no signed-in reporter"),
    }

    let previews = DiskPreviewStore::new(cfg.previews.directory.clone(), cfg.previews.max_edge);
    let probe = previews.acquire(&[0u8; 16]);
    match probe.path() {
        Some(_) => println!("previews: writable at {}", cfg.previews.directory.display()),
        None => println!("previews: not writable at {}", cfg.previews.directory.display()),
    }
    previews.release(probe);

    Ok(())
}
