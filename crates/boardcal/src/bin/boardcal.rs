use std::error::Error;
use std::path::{Path, PathBuf};

use boardcal::circles::{CircleDetector, FixedCircles};
use boardcal::core::{suggest, BoardCoordinate, DetectedCircle, Observation, PixelOffset};
use boardcal::report::{suggestion_line, PROCEDURE};
use boardcal::{
    BoardCalConfig, CalibrationLoop, CalibrationMode, CalibrationSession, CalibrationSetup, DisplaySink,
    FrameProcessor, FrameSource, HeadlessDisplay, ImageSequenceSource,
};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "boardcal")]
#[command(version, about = "Calibrate a fixed overhead camera against a coin board")]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors.
    #[arg(long, global = true)]
    quiet: bool,

    /// Emit logs as JSON. `RUST_LOG` overrides `-v` and `--quiet`.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the calibration loop on recorded frames or a live camera.
    Run(RunArgs),
    /// Print the default configuration as JSON.
    DefaultConfig,
    /// Print the constants the coin tracker needs.
    Export(ConfigArgs),
    /// Compute the next constants from one transcribed reading.
    Suggest(SuggestArgs),
    /// Print the operator procedure.
    Procedure,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Offset,
    Depth,
    Angle,
}

impl From<ModeArg> for CalibrationMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Offset => CalibrationMode::RecenterOffset,
            ModeArg::Depth => CalibrationMode::TuneDepth,
            ModeArg::Angle => CalibrationMode::VerifyAngle,
        }
    }
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// JSON config; defaults are used for anything it leaves out.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Image files or directories to replay instead of a camera.
    #[arg(long, num_args = 1..)]
    frames: Vec<PathBuf>,

    /// Loop over the frames until interrupted.
    #[arg(long)]
    repeat: bool,

    /// Save annotated frames as PNG into this directory.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Override the mode flags of the config.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Print suggested constants once readings are stable.
    #[arg(long)]
    assist: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Circle centers as `x,y,r`, used instead of detection.
    #[arg(long = "circle", value_parser = parse_circle)]
    circles: Vec<(f32, f32, f32)>,

    /// Camera index (overrides `capture.device`).
    #[cfg(feature = "opencv")]
    #[arg(long)]
    camera: Option<i32>,

    /// Use OpenCV's HoughCircles instead of the native detector.
    #[cfg(feature = "opencv")]
    #[arg(long)]
    opencv_hough: bool,
}

#[derive(clap::Args)]
struct SuggestArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Mode the reading was taken in.
    #[arg(long, value_enum)]
    mode: ModeArg,

    /// Printed x value (px in offset mode, mm otherwise).
    #[arg(long, allow_hyphen_values = true)]
    x: f64,

    /// Printed y value.
    #[arg(long, allow_hyphen_values = true)]
    y: f64,
}

fn parse_circle(raw: &str) -> Result<(f32, f32, f32), String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [x, y, r] = parts.as_slice() else {
        return Err(format!("expected x,y,r, got {raw:?}"));
    };
    let num = |s: &str| s.parse::<f32>().map_err(|e| format!("{s:?}: {e}"));
    Ok((num(x)?, num(y)?, num(r)?))
}

fn load_config(path: Option<&Path>) -> Result<BoardCalConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => {
            log::info!("loading config {}", path.display());
            BoardCalConfig::load(path)?
        }
        None => BoardCalConfig::default(),
    })
}

fn level_filter(cli: &Cli) -> LevelFilter {
    match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

fn init_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    #[cfg(feature = "tracing")]
    boardcal::core::init_tracing(cli.log_json, level_filter(cli));
    #[cfg(not(feature = "tracing"))]
    boardcal::core::init_with_level(level_filter(cli))?;
    Ok(())
}

fn drive<S, K, D>(
    source: S,
    display: K,
    processor: FrameProcessor<D>,
    cfg: &BoardCalConfig,
    max_frames: Option<usize>,
) -> Result<(), Box<dyn Error>>
where
    S: FrameSource,
    K: DisplaySink,
    D: CircleDetector,
{
    let mut run = CalibrationLoop::new(source, display, processor).with_max_frames(max_frames);
    if cfg.assist.enabled {
        let session = CalibrationSession::new(cfg.calibration, cfg.reference, cfg.assist.window);
        run = run.with_assist(session, cfg.assist.stable_tolerance);
    }
    let stdout = std::io::stdout();
    let summary = run.run(&mut stdout.lock())?;
    log::info!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn pick_detector(args: &RunArgs, setup: &CalibrationSetup) -> Box<dyn CircleDetector> {
    if !args.circles.is_empty() {
        let fixed = args
            .circles
            .iter()
            .map(|&(x, y, r)| DetectedCircle::new(x, y, r))
            .collect();
        return Box::new(FixedCircles(fixed));
    }
    #[cfg(feature = "opencv")]
    if args.opencv_hough {
        return Box::new(boardcal::OpenCvHoughDetector::new(*setup.detector.params()));
    }
    Box::new(setup.detector.clone())
}

fn cmd_run(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut cfg = load_config(args.config.config.as_deref())?;
    if let Some(mode) = args.mode {
        cfg.apply_mode(mode.into());
    }
    if args.assist {
        cfg.assist.enabled = true;
    }
    let setup = cfg.validate()?;
    log::info!("mode {}, constants {:?}", cfg.mode(), cfg.constants());

    let detector = pick_detector(&args, &setup);
    let processor = FrameProcessor::from_setup(&setup, detector);

    #[cfg(feature = "opencv")]
    if args.camera.is_some() || args.frames.is_empty() {
        let device = args.camera.unwrap_or(cfg.capture.device);
        let source = boardcal::OpenCvCapture::open(
            device,
            cfg.frame.width,
            cfg.frame.height,
            std::time::Duration::from_millis(cfg.capture.warmup_ms),
        )?;
        let display = boardcal::HighguiDisplay::new("boardcal")?;
        return drive(source, display, processor, &cfg, args.max_frames);
    }

    if args.frames.is_empty() {
        return Err("no input: pass --frames (live capture needs the `opencv` feature)".into());
    }
    let source = ImageSequenceSource::open(&args.frames)?.with_repeat(args.repeat);
    log::info!("replaying {} frames", source.len());
    let display = HeadlessDisplay::new(args.save_dir);
    display.install_ctrlc()?;
    drive(source, display, processor, &cfg, args.max_frames)
}

fn cmd_suggest(args: SuggestArgs) -> Result<(), Box<dyn Error>> {
    let cfg = load_config(args.config.config.as_deref())?;
    cfg.validate()?;
    let mode = CalibrationMode::from(args.mode);
    let observation = match mode {
        CalibrationMode::RecenterOffset => Observation::Offset(PixelOffset {
            dx: args.x,
            dy: args.y,
        }),
        CalibrationMode::TuneDepth | CalibrationMode::VerifyAngle => {
            Observation::Board(BoardCoordinate::new(args.x, args.y))
        }
    };
    let s = suggest(mode, &cfg.calibration, &cfg.reference, observation)?;
    println!("{}", suggestion_line(&s));
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::DefaultConfig => {
            println!("{}", BoardCalConfig::default().to_json_pretty()?);
            Ok(())
        }
        Commands::Export(args) => {
            let cfg = load_config(args.config.as_deref())?;
            cfg.validate()?;
            println!("{}", serde_json::to_string_pretty(&cfg.constants())?);
            Ok(())
        }
        Commands::Suggest(args) => cmd_suggest(args),
        Commands::Procedure => {
            print!("{PROCEDURE}");
            Ok(())
        }
    }
}
