//! planelock CLI — offline driver for the planar lock engine.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use planelock::homography::matrix3_to_array;
use planelock::{
    FastBriefBackend, FastBriefConfig, LockConfig, LockEngine, LockResult, ManualCalibration,
    PaintingPack, RansacHomographyConfig, ScanOutcome, Scanner, TriggerConfig, ZoneRole,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "planelock")]
#[command(about = "Lock a camera view onto a reference painting and trigger zone roles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay still frames through the lock engine and zone scanner.
    Track(CliTrackArgs),

    /// Solve a manual 4-corner calibration and map a point.
    Calibrate(CliCalibrateArgs),

    /// Print a painting pack summary.
    PackInfo {
        /// Pack JSON (default: bundled demo pack).
        #[arg(long)]
        pack: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Reference image of the painting.
    #[arg(long)]
    reference: PathBuf,

    /// Camera frames, replayed in order.
    #[arg(long = "frame", required = true, num_args = 1..)]
    frames: Vec<PathBuf>,

    /// Pack JSON (default: bundled demo pack).
    #[arg(long)]
    pack: Option<PathBuf>,

    /// Tuning JSON with optional `lock`, `trigger`, `features`, `ransac` sections.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated render tick (ms).
    #[arg(long, default_value = "16")]
    tick_ms: u64,

    /// Render ticks spent on each frame.
    #[arg(long, default_value = "15")]
    ticks_per_frame: u32,

    /// Override the estimation interval (ms, >= 80).
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Override the analysis width (pixels, >= 160).
    #[arg(long)]
    analysis_width: Option<u32>,

    /// Override the hold window (ms).
    #[arg(long)]
    hold_ms: Option<u64>,

    /// Write per-tick results here (JSON). Printed to stdout otherwise.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliCalibrateArgs {
    /// Frame-normalized corner tap `x,y`, in order TL, TR, BR, BL.
    #[arg(long = "tap", required = true, num_args = 1, value_parser = parse_point)]
    taps: Vec<[f64; 2]>,

    /// Frame-normalized point to map (default: frame center).
    #[arg(long, value_parser = parse_point)]
    point: Option<[f64; 2]>,

    /// Pack JSON used to resolve the mapped point (default: bundled demo pack).
    #[arg(long)]
    pack: Option<PathBuf>,
}

/// Tuning file layout for `track`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TrackConfig {
    lock: LockConfig,
    trigger: TriggerConfig,
    features: FastBriefConfig,
    ransac: RansacHomographyConfig,
}

#[derive(Debug, serde::Serialize)]
struct TickRecord {
    t_ms: u64,
    frame: usize,
    #[serde(flatten)]
    lock: LockResult,
    #[serde(flatten)]
    scan: ScanOutcome,
}

fn parse_point(s: &str) -> Result<[f64; 2], String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'x,y', got '{s}'"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in '{s}': {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in '{s}': {e}"))?;
    Ok([x, y])
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Calibrate(args) => run_calibrate(&args),
        Commands::PackInfo { pack } => run_pack_info(pack.as_deref()),
    }
}

fn load_pack(path: Option<&Path>) -> CliResult<PaintingPack> {
    match path {
        Some(p) => {
            tracing::info!("Loading pack: {}", p.display());
            Ok(PaintingPack::from_json_file(p)?)
        }
        None => Ok(PaintingPack::default()),
    }
}

fn load_gray(path: &Path) -> CliResult<image::GrayImage> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    Ok(img.to_luma8())
}

/// Synth voices a role plays in the installation.
fn voices_for(role: ZoneRole) -> &'static [&'static str] {
    match role {
        ZoneRole::Pad | ZoneRole::Macro => &["pad"],
        ZoneRole::Epiano | ZoneRole::PatternMelody => &["epiano"],
        ZoneRole::Perc | ZoneRole::PatternRhythm => &["click"],
        ZoneRole::Accent => &["click", "epiano"],
    }
}

// ── pack-info ──────────────────────────────────────────────────────────

fn run_pack_info(pack: Option<&Path>) -> CliResult<()> {
    let pack = load_pack(pack)?;

    println!("planelock painting pack");
    println!("  id:               {}", pack.id);
    println!("  title:            {}", pack.title);
    println!("  reference image:  {}", pack.reference_image);
    println!("  zones:            {}", pack.zones.len());
    for z in &pack.zones {
        println!(
            "    {:<10} ({:.2}, {:.2}) r={:.2}  {:<15} -> {}",
            z.id,
            z.x,
            z.y,
            z.r,
            z.role.as_str(),
            voices_for(z.role).join(" + ")
        );
    }

    Ok(())
}

// ── calibrate ──────────────────────────────────────────────────────────

fn run_calibrate(args: &CliCalibrateArgs) -> CliResult<()> {
    if args.taps.len() != 4 {
        return Err(format!("expected 4 --tap values, got {}", args.taps.len()).into());
    }

    let mut cal = ManualCalibration::new();
    for &[x, y] in &args.taps {
        cal.add_tap(x, y)?;
    }
    let h = cal
        .homography()
        .map(matrix3_to_array)
        .ok_or_else(|| -> CliError { "calibration incomplete".into() })?;

    println!("frame -> reference homography:");
    for row in h {
        println!("  [{:>12.6} {:>12.6} {:>12.6}]", row[0], row[1], row[2]);
    }

    let [px, py] = args.point.unwrap_or([0.5, 0.5]);
    match cal.map_point(px, py) {
        Some([x, y]) => {
            println!("point ({px:.4}, {py:.4}) -> reference ({x:.4}, {y:.4})");
            let pack = load_pack(args.pack.as_deref())?;
            match pack.find_zone(x, y) {
                Some(z) => println!("zone: {} ({})", z.id, z.role),
                None => println!("zone: none"),
            }
        }
        None => println!("point ({px:.4}, {py:.4}) maps to infinity"),
    }

    Ok(())
}

// ── track ──────────────────────────────────────────────────────────────

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let mut config = match &args.config {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            serde_json::from_str::<TrackConfig>(&std::fs::read_to_string(p)?)?
        }
        None => TrackConfig::default(),
    };
    if let Some(v) = args.poll_interval_ms {
        config.lock.poll_interval_ms = v;
    }
    if let Some(v) = args.analysis_width {
        config.lock.analysis_width = v;
    }
    if let Some(v) = args.hold_ms {
        config.lock.hold_ms = v;
    }

    let pack = load_pack(args.pack.as_deref())?;
    tracing::info!("Pack '{}' with {} zones", pack.id, pack.zones.len());

    tracing::info!("Loading reference: {}", args.reference.display());
    let reference = load_gray(&args.reference)?;

    let backend = FastBriefBackend::new(config.features);
    let mut engine = LockEngine::with_estimator(backend, config.ransac, config.lock);
    engine.init(&reference)?;
    let (aw, ah) = engine.config().analysis_size();
    tracing::info!(
        "Analysis {}x{}, poll every {} ms, hold {} ms",
        aw,
        ah,
        engine.config().poll_interval_ms,
        engine.config().hold_ms
    );

    let mut scanner = Scanner::new(pack, config.trigger);
    let mut sink = |role: ZoneRole| {
        tracing::info!("play {} -> {}", role, voices_for(role).join(" + "));
    };

    let mut records = Vec::new();
    let mut now_ms = 0u64;
    for (frame_idx, path) in args.frames.iter().enumerate() {
        let frame = load_gray(path)?;
        tracing::debug!("Frame {}: {}", frame_idx, path.display());

        for _ in 0..args.ticks_per_frame {
            let lock = engine.process(&frame, now_ms);
            let scan = scanner.update(lock.mapped_point(), now_ms, &mut sink);
            records.push(TickRecord {
                t_ms: now_ms,
                frame: frame_idx,
                lock,
                scan,
            });
            now_ms += args.tick_ms;
        }
    }

    let n_locked = records.iter().filter(|r| r.lock.locked).count();
    let n_fired = records.iter().filter(|r| r.scan.fired.is_some()).count();
    tracing::info!(
        "{} ticks, {} locked, {} triggers",
        records.len(),
        n_locked,
        n_fired
    );

    let json = serde_json::to_string_pretty(&records)?;
    match &args.out {
        Some(out) => {
            std::fs::write(out, &json)?;
            tracing::info!("Results written to {}", out.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
