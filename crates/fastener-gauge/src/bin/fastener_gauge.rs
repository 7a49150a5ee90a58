use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fastener_gauge::config::GaugeConfig;
use fastener_gauge::core::{
    estimate_size, ratio_from_reference, CalibrationStore, RoiConfig, RoiStore, RoiTransform,
    Units, DEFAULT_REFERENCE_LENGTH,
};
use fastener_gauge::detector::ReplayDetector;
use fastener_gauge::display::ScriptedDisplay;
use fastener_gauge::pipeline::DetectionLoop;
use fastener_gauge::report::SessionReport;
#[cfg(feature = "camera")]
use fastener_gauge::source::CameraSource;
use fastener_gauge::source::{FrameSource, ImageSequenceSource};
use log::LevelFilter;
use nalgebra::Point2;

#[derive(Parser, Debug)]
#[command(name = "fastener-gauge", version, about = "Measure nuts and bolts on a conveyor")]
struct Cli {
    /// Log level: off, error, warn, info, debug, trace.
    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the detection loop over a frame directory.
    Run(RunArgs),
    /// Compute and store the pixels-per-mm ratio from a reference line.
    Calibrate(CalibrateArgs),
    /// Order, validate and store a four-point ROI.
    Roi(RoiArgs),
    /// Convert a box size in pixels to physical units.
    Measure(MeasureArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnitArg {
    Mm,
    Cm,
}

impl From<UnitArg> for Units {
    fn from(u: UnitArg) -> Self {
        match u {
            UnitArg::Mm => Units::Millimeters,
            UnitArg::Cm => Units::Centimeters,
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON run configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Camera device index (needs the `camera` feature).
    #[arg(long, conflicts_with = "frames")]
    device: Option<i32>,
    #[arg(long)]
    frames: Option<PathBuf>,
    #[arg(long)]
    detections: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Write every shown frame here as PNG.
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long)]
    roi_store: Option<PathBuf>,
    #[arg(long)]
    calibration_store: Option<PathBuf>,
    #[arg(long, value_enum)]
    units: Option<UnitArg>,
    #[arg(long)]
    threshold: Option<f32>,
    /// Session-only pixels-per-mm ratio.
    #[arg(long)]
    ratio: Option<f32>,
}

#[derive(Args, Debug)]
struct CalibrateArgs {
    /// First end of the reference line, as `x,y`.
    #[arg(long, value_parser = parse_point)]
    from: [f32; 2],
    /// Second end of the reference line, as `x,y`.
    #[arg(long, value_parser = parse_point)]
    to: [f32; 2],
    /// Physical length of the reference in mm.
    #[arg(long, default_value_t = DEFAULT_REFERENCE_LENGTH)]
    known_length: f32,
    #[arg(long, default_value = CalibrationStore::DEFAULT_PATH)]
    store: PathBuf,
}

#[derive(Args, Debug)]
struct RoiArgs {
    /// Four corners as `x,y`, in any order.
    #[arg(long, num_args = 4, value_parser = parse_point, required = true)]
    points: Vec<[f32; 2]>,
    #[arg(long, default_value = RoiStore::DEFAULT_PATH)]
    store: PathBuf,
}

#[derive(Args, Debug)]
struct MeasureArgs {
    /// Box width in pixels.
    #[arg(long)]
    width: f32,
    /// Box height in pixels.
    #[arg(long)]
    height: f32,
    /// Pixels per mm; read from the calibration store when absent.
    #[arg(long)]
    ratio: Option<f32>,
    #[arg(long, default_value = CalibrationStore::DEFAULT_PATH)]
    store: PathBuf,
    #[arg(long, value_enum, default_value = "mm")]
    units: UnitArg,
}

fn parse_point(s: &str) -> Result<[f32; 2], String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f32>()
            .map_err(|err| format!("bad coordinate `{v}`: {err}"))
    };
    Ok([parse(x)?, parse(y)?])
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse().map_err(|_| format!("unknown log level `{s}`"))
}

fn init_logging(level: LevelFilter) {
    #[cfg(feature = "tracing")]
    fastener_gauge::core::init_tracing(level, false);
    #[cfg(not(feature = "tracing"))]
    if let Err(err) = fastener_gauge::core::init_with_level(level) {
        eprintln!("logger already installed: {err}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Calibrate(args) => calibrate(args),
        Command::Roi(args) => roi(args),
        Command::Measure(args) => measure(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut cfg = match &args.config {
        Some(path) => GaugeConfig::load_json(path)?,
        None => GaugeConfig::default(),
    };
    if args.device.is_some() {
        cfg.device = args.device;
    }
    if args.frames.is_some() {
        cfg.frames_dir = args.frames;
        cfg.device = None;
    }
    if args.detections.is_some() {
        cfg.detections_path = args.detections;
    }
    if args.events.is_some() {
        cfg.events_path = args.events;
    }
    if args.output.is_some() {
        cfg.output_dir = args.output;
    }
    if args.report.is_some() {
        cfg.report_path = args.report;
    }
    if let Some(path) = args.roi_store {
        cfg.roi_path = path;
    }
    if let Some(path) = args.calibration_store {
        cfg.calibration_path = path;
    }
    if let Some(units) = args.units {
        cfg.detection.units = units.into();
    }
    if let Some(threshold) = args.threshold {
        cfg.detection.threshold = threshold;
    }
    if args.ratio.is_some() {
        cfg.pixels_per_unit = args.ratio;
    }

    let mut source = open_source(&cfg)?;
    let detector = ReplayDetector::load_json(cfg.detections_path()?)?;

    let mut display = ScriptedDisplay::new();
    if let Some(dir) = &cfg.output_dir {
        display = display.with_output_dir(dir);
    }
    if let Some(path) = &cfg.events_path {
        display = display.with_events(ScriptedDisplay::load_script(path)?);
    }

    let mut gauge = DetectionLoop::new(
        detector,
        cfg.detection,
        cfg.calibration_store(),
        cfg.roi_store(),
    );
    if let Some(ratio) = cfg.pixels_per_unit {
        gauge.override_ratio(ratio);
    }

    let report = SessionReport::from(gauge.run(source.as_mut(), &mut display));
    let report_path = cfg.report_path();
    report.write_json(&report_path)?;
    println!(
        "{} frames, {} measurements, {:.2} px/mm; wrote {}",
        report.frames.len(),
        report.measurement_count(),
        report.pixels_per_unit,
        report_path.display()
    );
    Ok(())
}

fn open_source(cfg: &GaugeConfig) -> Result<Box<dyn FrameSource>, Box<dyn Error>> {
    match cfg.device {
        Some(index) => open_camera(index),
        None => Ok(Box::new(ImageSequenceSource::open(cfg.frames_dir()?)?)),
    }
}

#[cfg(feature = "camera")]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>, Box<dyn Error>> {
    Ok(Box::new(CameraSource::open(index)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>, Box<dyn Error>> {
    Err(format!("camera {index} requested, but this build has no `camera` feature").into())
}

fn calibrate(args: CalibrateArgs) -> Result<(), Box<dyn Error>> {
    let [ax, ay] = args.from;
    let [bx, by] = args.to;
    let ratio = ratio_from_reference(Point2::new(ax, ay), Point2::new(bx, by), args.known_length)?;

    let store = CalibrationStore::new(&args.store);
    if !store.save(ratio) {
        return Err(format!("could not write {}", args.store.display()).into());
    }
    println!("{ratio:.4} px/mm");
    Ok(())
}

fn roi(args: RoiArgs) -> Result<(), Box<dyn Error>> {
    let picked: [[f32; 2]; 4] = args
        .points
        .as_slice()
        .try_into()
        .map_err(|_| "exactly four points are required")?;
    let cfg = RoiConfig::from_picked(picked.map(|[x, y]| Point2::new(x, y)))?;
    RoiTransform::new(cfg)?;

    let store = RoiStore::new(&args.store);
    if !store.save(&cfg) {
        return Err(format!("could not write {}", args.store.display()).into());
    }
    println!("ROI {}x{}", cfg.width, cfg.height);
    Ok(())
}

fn measure(args: MeasureArgs) -> Result<(), Box<dyn Error>> {
    let ratio = match args.ratio {
        Some(r) if r.is_finite() && r > 0.0 => r,
        Some(r) => return Err(format!("ratio must be positive, got {r}").into()),
        None => CalibrationStore::new(&args.store).load(),
    };
    let units = Units::from(args.units);
    let (w, h) = estimate_size(args.width, args.height, ratio);
    println!(
        "{:.1}x{:.1}{}",
        w * units.scale(),
        h * units.scale(),
        units.suffix()
    );
    Ok(())
}
