use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use plotters::prelude::*;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use topout_lib::{
    detectors::{
        attempts::{run_attempt_pipeline, ExtractorConfig},
        climbing::normalize_observations,
    },
    io::{config as config_io, history as history_io},
    metrics::session::session_summary,
    plot::{figure_from_session, Figure, Series},
    ClimbingStateHistory, SessionWindow,
};
use topout_run::{read_bundle, read_design, simulate_session, write_bundle};

#[derive(Parser)]
#[command(
    name = "topout",
    version,
    about = "TopOut: climbing attempt extraction tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the history comes from and how to debounce it.
#[derive(Args)]
struct SessionArgs {
    /// History file (.json, .csv or .tsv); JSON on stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Recording start, epoch ms (defaults to the first sample)
    #[arg(long)]
    session_start: Option<i64>,
    /// Recording stop, epoch ms (defaults to the last sample)
    #[arg(long)]
    session_end: Option<i64>,
    /// Debounce window override
    #[arg(long)]
    min_duration_ms: Option<i64>,
    /// TOML settings file with an [extractor] table
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract debounced climbing attempts from a state history
    Attempts {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Attempt statistics for a session
    Summary {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Render the raw signal and attempts to a PNG via plotters
    Plot {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        out: PathBuf,
    },
    /// Normalize a raw detector log (Climbing/Idle/NotDetected) into a history
    Classify {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Simulate a noisy session from a TOML design and write its bundle
    Simulate {
        #[arg(long)]
        design: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Session start, epoch ms (defaults to now)
        #[arg(long)]
        start: Option<i64>,
    },
    /// Re-extract attempts from a session bundle
    Inspect {
        #[arg(long)]
        bundle: PathBuf,
        #[arg(long)]
        min_duration_ms: Option<i64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Attempts { session } => cmd_attempts(&session)?,
        Commands::Summary { session } => cmd_summary(&session)?,
        Commands::Plot { session, out } => cmd_plot(&session, &out)?,
        Commands::Classify { input } => cmd_classify(input.as_deref())?,
        Commands::Simulate { design, out, start } => cmd_simulate(&design, &out, start)?,
        Commands::Inspect {
            bundle,
            min_duration_ms,
        } => cmd_inspect(&bundle, min_duration_ms)?,
    }
    Ok(())
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn load_history(input: Option<&Path>) -> Result<ClimbingStateHistory> {
    match input {
        Some(path) => history_io::read_history(path),
        None => history_io::parse_history_json(&read_input(None)?),
    }
}

fn extractor_config(
    config: Option<&Path>,
    min_duration_ms: Option<i64>,
) -> Result<ExtractorConfig> {
    let mut cfg = match config {
        Some(path) => config_io::read_settings(path)?.extractor,
        None => ExtractorConfig::default(),
    };
    if let Some(ms) = min_duration_ms {
        cfg.min_duration_ms = ms;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn session_window(history: &ClimbingStateHistory, args: &SessionArgs) -> SessionWindow {
    let first = history.samples().first().map(|s| s.timestamp);
    let last = history.last().map(|s| s.timestamp);
    let start = args.session_start.or(first).unwrap_or(0);
    let end = args.session_end.or(last).unwrap_or(start);
    SessionWindow::new(start, end)
}

fn load_session(
    args: &SessionArgs,
) -> Result<(ClimbingStateHistory, SessionWindow, ExtractorConfig)> {
    let history = load_history(args.input.as_deref())?;
    let window = session_window(&history, args);
    let cfg = extractor_config(args.config.as_deref(), args.min_duration_ms)?;
    info!(
        "{} transitions, window {}..{} ({} ms debounce)",
        history.len(),
        window.start,
        window.end,
        cfg.min_duration_ms
    );
    Ok((history, window, cfg))
}

fn cmd_attempts(args: &SessionArgs) -> Result<()> {
    let (history, window, cfg) = load_session(args)?;
    let extraction = run_attempt_pipeline(&history, window, &cfg)?;
    println!("{}", serde_json::to_string(&extraction)?);
    Ok(())
}

fn cmd_summary(args: &SessionArgs) -> Result<()> {
    let (history, window, cfg) = load_session(args)?;
    let extraction = run_attempt_pipeline(&history, window, &cfg)?;
    let summary = session_summary(&history, window, &extraction.attempts);
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_plot(args: &SessionArgs, out: &Path) -> Result<()> {
    let (history, window, cfg) = load_session(args)?;
    let extraction = run_attempt_pipeline(&history, window, &cfg)?;
    let fig = figure_from_session(&history, window, &extraction.attempts);
    draw_plotters_figure(out, &fig)?;
    Ok(())
}

fn cmd_classify(input: Option<&Path>) -> Result<()> {
    let observations = history_io::parse_observations_json(&read_input(input)?)?;
    let history = normalize_observations(&observations);
    println!("{}", serde_json::to_string(&history)?);
    Ok(())
}

fn cmd_simulate(design: &Path, out: &Path, start: Option<i64>) -> Result<()> {
    let design = read_design(design)?;
    let start = match start {
        Some(start) => start,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|dur| dur.as_millis() as i64)
            .unwrap_or(0),
    };
    let sim = simulate_session(&design, start)?;
    write_bundle(out, &sim.bundle)?;
    println!("{}", serde_json::to_string(&sim.bundle.manifest)?);
    Ok(())
}

fn cmd_inspect(dir: &Path, min_duration_ms: Option<i64>) -> Result<()> {
    let bundle = read_bundle(dir)?;
    let cfg = ExtractorConfig {
        min_duration_ms: min_duration_ms.unwrap_or(bundle.manifest.min_duration_ms),
    };
    let extraction = run_attempt_pipeline(&bundle.history, bundle.manifest.window(), &cfg)?;
    println!("{}", serde_json::to_string(&extraction)?);
    Ok(())
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let backend = BitMapBackend::new(path, (1000, 360));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let [x_min, x_max] = fig.x_range;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, -0.1f64..1.1f64)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Band(band) => {
                let (r, g, b) = band.style.color.rgb();
                let fill = RGBColor(r, g, b).filled();
                chart.draw_series(
                    band.spans
                        .iter()
                        .map(|span| Rectangle::new([(span[0], 0.0), (span[1], 1.0)], fill)),
                )?;
            }
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                ))?;
            }
        }
    }
    root.present()?;
    Ok(())
}
