use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use gps_classify::track::{Measurement, Point};
use gps_classify::{
    decode_log, process, render_kml, AltitudeFilter, Category, ClassifiedTracks, DecodeReport,
    Params, StopCategory, TerrainCategory,
};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify stops and terrain in an NMEA log and write a KML overlay", long_about = None)]
struct Cli {
    /// NMEA log to read
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// KML file to write
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// JSON parameter file (missing keys keep their defaults)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Altitude spike handling
    #[arg(long, value_enum)]
    altitude_filter: Option<AltitudeFilterOpt>,

    /// Stationary time (seconds) before a stop counts as an errand
    #[arg(long)]
    errand_gap: Option<f64>,

    /// Speeds below this at a local minimum count as rolling stops
    #[arg(long)]
    rolling_stop_speed: Option<f64>,

    /// Number of altitude samples in each slope window
    #[arg(long)]
    slope_window: Option<usize>,

    /// Slope (altitude units per second) separating flat from up/downhill
    #[arg(long)]
    slope_threshold: Option<f64>,

    /// Also write every classified point as CSV (`-` for stdout)
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    /// Speed-over-time scatter plot (PNG or SVG by extension)
    #[arg(long, value_hint = ValueHint::FilePath)]
    plot_speed: Option<PathBuf>,

    /// Altitude-over-time scatter plot (PNG or SVG by extension)
    #[arg(long, value_hint = ValueHint::FilePath)]
    plot_altitude: Option<PathBuf>,

    /// Write the decode report as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AltitudeFilterOpt {
    Passthrough,
    DropSpikes,
}

impl From<AltitudeFilterOpt> for AltitudeFilter {
    fn from(value: AltitudeFilterOpt) -> Self {
        match value {
            AltitudeFilterOpt::Passthrough => AltitudeFilter::Passthrough,
            AltitudeFilterOpt::DropSpikes => AltitudeFilter::DropSpikes,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let params = resolve_params(&cli)?;
    debug!("parameters: {:?}", params);

    let t_decode = Instant::now();
    let bytes =
        fs::read(&cli.input).with_context(|| format!("failed to read {}", cli.input.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let log = decode_log(&text);
    log_decode_summary(&log.report);
    debug!(
        "Decode stage: {:.1} ms",
        t_decode.elapsed().as_secs_f64() * 1000.0
    );

    if let Some(path) = cli.report.as_ref() {
        write_report(&log.report, path)?;
        info!("Wrote decode report: {}", path.display());
    }

    let t_classify = Instant::now();
    let tracks = process(&log.kinematic, &log.elevation, &params)
        .with_context(|| format!("failed to classify {}", cli.input.display()))?;
    debug!(
        "Classify stage: {:.1} ms",
        t_classify.elapsed().as_secs_f64() * 1000.0
    );
    log_classification_summary(&tracks);

    // Render fully before touching the output so a failed run leaves nothing behind.
    let kml = render_kml(&tracks.speed, &tracks.altitude);
    fs::write(&cli.output, kml)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!("Wrote KML: {}", cli.output.display());

    if let Some(path) = cli.csv.as_ref() {
        if path.as_os_str() == "-" {
            write_points_stdout(&tracks)?;
        } else {
            write_points_csv(&tracks, path)?;
            info!("Wrote points CSV: {}", path.display());
        }
    }

    if let Some(path) = cli.plot_speed.as_ref() {
        let series = scatter_series(&tracks.speed, stop_color);
        match render_chart_guard(&series, "Speed", path) {
            Ok(()) => info!("Wrote plot: {}", path.display()),
            Err(err) => warn!("Skipping speed plot ({}): {}", path.display(), err),
        }
    }

    if let Some(path) = cli.plot_altitude.as_ref() {
        let series = scatter_series(&tracks.altitude, terrain_color);
        match render_chart_guard(&series, "Altitude", path) {
            Ok(()) => info!("Wrote plot: {}", path.display()),
            Err(err) => warn!("Skipping altitude plot ({}): {}", path.display(), err),
        }
    }

    Ok(())
}

fn resolve_params(cli: &Cli) -> Result<Params> {
    let mut params = match cli.config.as_ref() {
        Some(path) => load_params(path)?,
        None => Params::default(),
    };
    if let Some(filter) = cli.altitude_filter {
        params.altitude_filter = filter.into();
    }
    if let Some(gap) = cli.errand_gap {
        params.errand_gap_s = gap;
    }
    if let Some(speed) = cli.rolling_stop_speed {
        params.rolling_stop_max_speed = speed;
    }
    if let Some(window) = cli.slope_window {
        params.slope_window = window;
    }
    if let Some(threshold) = cli.slope_threshold {
        params.slope_threshold = threshold;
    }
    params
        .validate()
        .map_err(|e| anyhow!("invalid parameters: {}", e))?;
    Ok(params)
}

fn load_params(path: &Path) -> Result<Params> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    Params::from_json(&text).with_context(|| format!("{} is not a valid config", path.display()))
}

fn log_decode_summary(report: &DecodeReport) {
    info!(
        "Decoded {} lines: {} RMC, {} GGA, {} other, {} skipped",
        report.lines,
        report.kinematic,
        report.elevation,
        report.ignored,
        report.skipped.len()
    );
    for skipped in report.skipped.iter().take(5) {
        warn!("line {}: {}", skipped.line, skipped.reason);
    }
    if report.skipped.len() > 5 {
        warn!("... and {} more skipped lines", report.skipped.len() - 5);
    }
}

fn log_classification_summary(tracks: &ClassifiedTracks) {
    let count_stop = |c: StopCategory| tracks.speed.iter().filter(|p| p.category == c).count();
    let count_terrain =
        |c: TerrainCategory| tracks.altitude.iter().filter(|p| p.category == c).count();
    info!(
        "Stops: {} errand, {} rolling ({} speed points)",
        count_stop(StopCategory::ErrandStop),
        count_stop(StopCategory::RollingStop),
        tracks.speed.len()
    );
    info!(
        "Terrain: {} ascending, {} descending, {} flat ({} altitude points)",
        count_terrain(TerrainCategory::Ascending),
        count_terrain(TerrainCategory::Descending),
        count_terrain(TerrainCategory::Flat),
        tracks.altitude.len()
    );
}

fn write_report(report: &DecodeReport, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(report)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn write_points_stdout(tracks: &ClassifiedTracks) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_point_rows(tracks, &mut writer)
}

fn write_points_csv(tracks: &ClassifiedTracks, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_point_rows(tracks, &mut writer)
}

fn write_point_rows<W: Write>(tracks: &ClassifiedTracks, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "track",
        "time_s",
        "longitude",
        "latitude",
        "speed",
        "direction",
        "altitude",
        "category",
    ])?;

    for point in &tracks.speed {
        writer.write_record([
            "speed".to_string(),
            format!("{:.3}", point.time),
            point.longitude.to_string(),
            point.latitude.to_string(),
            point.speed().to_string(),
            point.direction().to_string(),
            String::new(),
            point.category.label().to_string(),
        ])?;
    }

    for point in &tracks.altitude {
        writer.write_record([
            "altitude".to_string(),
            format!("{:.3}", point.time),
            point.longitude.to_string(),
            point.latitude.to_string(),
            String::new(),
            String::new(),
            point.altitude().to_string(),
            point.category.label().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Clone, Debug)]
struct ScatterSeries {
    label: &'static str,
    color: RGBColor,
    points: Vec<(f64, f64)>,
}

fn stop_color(category: StopCategory) -> RGBColor {
    match category {
        StopCategory::Unclassified => RGBColor(0, 0, 0),
        StopCategory::ErrandStop => RGBColor(255, 215, 0),
        StopCategory::RollingStop => RGBColor(255, 105, 180),
    }
}

fn terrain_color(category: TerrainCategory) -> RGBColor {
    match category {
        TerrainCategory::Unclassified => RGBColor(0, 0, 0),
        TerrainCategory::Ascending => RGBColor(220, 20, 20),
        TerrainCategory::Descending => RGBColor(20, 160, 20),
        TerrainCategory::Flat => RGBColor(0, 200, 220),
    }
}

/// Group a track into one scatter series per category, in first-seen order.
fn scatter_series<M: Measurement>(
    track: &[Point<M>],
    color: fn(M::Category) -> RGBColor,
) -> Vec<ScatterSeries> {
    let mut series: Vec<(M::Category, ScatterSeries)> = Vec::new();
    for point in track {
        let xy = (point.time, point.measurement.value());
        match series.iter_mut().find(|(c, _)| *c == point.category) {
            Some((_, s)) => s.points.push(xy),
            None => series.push((
                point.category,
                ScatterSeries {
                    label: point.category.label(),
                    color: color(point.category),
                    points: vec![xy],
                },
            )),
        }
    }
    series.into_iter().map(|(_, s)| s).collect()
}

enum ChartKind {
    Png,
    Svg,
}

fn chart_kind(path: &Path) -> ChartKind {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("svg") => ChartKind::Svg,
        _ => ChartKind::Png,
    }
}

fn render_chart_guard(series: &[ScatterSeries], y_label: &str, path: &Path) -> Result<(), String> {
    if series.iter().all(|s| s.points.is_empty()) {
        return Err("track is empty".to_string());
    }
    let render = || -> Result<(), String> {
        match chart_kind(path) {
            ChartKind::Png => {
                let root = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
                draw_scatter(root, series, y_label).map_err(|e| format!("plotting error: {}", e))
            }
            ChartKind::Svg => {
                let root = SVGBackend::new(path, (1280, 720)).into_drawing_area();
                draw_scatter(root, series, y_label).map_err(|e| format!("plotting error: {}", e))
            }
        }
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn axis_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() || lo > hi {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad, hi + pad)
}

fn draw_scatter<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    series: &[ScatterSeries],
    y_label: &str,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&WHITE)?;

    let (x_min, x_max) = axis_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
    let (y_min, y_max) = axis_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));

    let mut chart = ChartBuilder::on(&area)
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    let axis_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);
    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_desc("Time (s)")
        .y_desc(y_label)
        .label_style(axis_font.color(&BLACK.mix(0.85)))
        .draw()?;

    for s in series {
        let color = s.color;
        chart
            .draw_series(
                s.points
                    .iter()
                    .map(move |&(x, y)| Circle::new((x, y), 3, color.filled())),
            )?
            .label(s.label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 8, y + 4)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    area.present()?;
    Ok(())
}
