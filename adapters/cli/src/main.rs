#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for inspecting match telemetry.

mod export;
mod manifest;
mod source;

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use match_atlas_core::{
    selection::{self, MatchFilter, SortOrder},
    Day, MapId, MatchId,
};
use match_atlas_rendering::{
    present, reduce, DrawCommand, FilterToggle, RenderSources, Renderer, ViewEffect, ViewInput,
    ViewMode, ViewState,
};
use match_atlas_session::{apply, poll_aggregation, query, Command, Event, Session};
use match_atlas_system_aggregation::{AggregationKind, AggregationScope, JobStatus};
use match_atlas_system_density::{HeatmapImage, HeatmapMode, DEFAULT_KERNEL_RADIUS};
use match_atlas_system_timeline::MIN_PLAYBACK_SPEED;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{export::JsonSurface, source::FsMatchSource};

#[derive(Debug, Parser)]
#[command(
    name = "match-atlas",
    version,
    about = "Inspect match telemetry as journeys, heatmaps, overlays and playback"
)]
struct Cli {
    /// Directory holding `matches.json` and the per-match telemetry files.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,
    /// Map calibration manifest; defaults to `<data-dir>/maps.toml` or the shipped maps.
    #[arg(long, global = true)]
    maps: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Lists indexed matches.
    List(ListArgs),
    /// Writes the journey draw list of one match as JSON.
    Journeys(JourneysArgs),
    /// Renders a density heatmap to PNG.
    Heatmap(HeatmapArgs),
    /// Aggregates every match on a map into an overlay.
    Overlay(OverlayArgs),
    /// Simulates playback of one match.
    Timeline(TimelineArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Combat,
    Participants,
}

impl From<SortArg> for SortOrder {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Combat => Self::CombatEvents,
            SortArg::Participants => Self::Participants,
        }
    }
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Only list matches played on this map.
    #[arg(long)]
    map: Option<String>,
    /// Only list matches recorded on this day.
    #[arg(long)]
    day: Option<String>,
    /// Ordering of the listed matches.
    #[arg(long, value_enum, default_value = "combat")]
    sort: SortArg,
}

#[derive(Debug, Args)]
struct JourneysArgs {
    /// Match to draw.
    match_id: String,
    /// Time cursor; defaults to the end of the match.
    #[arg(long)]
    at: Option<f64>,
    /// Hide bot paths and markers.
    #[arg(long)]
    no_bots: bool,
    /// Hide path polylines while keeping markers.
    #[arg(long)]
    no_paths: bool,
    /// Replace marker glyphs with primitive shapes.
    #[arg(long)]
    expand_markers: bool,
    /// Output file; defaults to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct HeatmapArgs {
    /// Match whose map and events are used.
    match_id: String,
    /// Event population to plot.
    #[arg(long, default_value_t = HeatmapMode::Traffic)]
    mode: HeatmapMode,
    /// Kernel radius in pixels.
    #[arg(long, default_value_t = DEFAULT_KERNEL_RADIUS)]
    radius: f32,
    /// Intensity step from 1 to 10.
    #[arg(long, default_value_t = 5)]
    intensity: u8,
    /// Pool every indexed match on the same map.
    #[arg(long)]
    aggregate: bool,
    /// Restrict pooling to one day.
    #[arg(long, requires = "aggregate")]
    day: Option<String>,
    /// Time cursor for single-match heatmaps.
    #[arg(long)]
    at: Option<f64>,
    /// Image whose opacity channel clips the heatmap.
    #[arg(long)]
    mask: Option<PathBuf>,
    /// Output PNG path.
    #[arg(long, default_value = "heatmap.png")]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct OverlayArgs {
    /// Map to aggregate.
    map: String,
    /// Restrict the overlay to one day.
    #[arg(long)]
    day: Option<String>,
    /// Hide bot paths.
    #[arg(long)]
    no_bots: bool,
    /// Write the overlay draw list as JSON to this file.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TimelineArgs {
    /// Match to play back.
    match_id: String,
    /// Playback speed multiplier.
    #[arg(long, default_value_t = 1.0, value_parser = parse_speed)]
    speed: f64,
    /// Host milliseconds between ticks.
    #[arg(long, default_value_t = 1000)]
    step_ms: u64,
}

/// Entry point for the match atlas command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let calibrations = manifest::load_calibrations(cli.maps.as_deref(), &cli.data_dir)?;
    let mut source = FsMatchSource::new(&cli.data_dir);
    let mut session = Session::new(calibrations);
    let mut events = Vec::new();
    apply(
        &mut session,
        Command::LoadIndex {
            matches: source.load_index()?,
        },
        &mut events,
    );

    match cli.command {
        CliCommand::List(args) => list(&session, &args),
        CliCommand::Journeys(args) => journeys(&mut session, &mut source, &args),
        CliCommand::Heatmap(args) => heatmap(&mut session, &mut source, &args),
        CliCommand::Overlay(args) => overlay(&mut session, &mut source, &args),
        CliCommand::Timeline(args) => timeline(&mut session, &mut source, &args),
    }
}

fn list(session: &Session, args: &ListArgs) -> Result<()> {
    let filter = MatchFilter {
        map: args.map.clone().map(MapId::new),
        day: args.day.clone().map(Day::new),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for summary in selection::select(query::index(session), &filter, args.sort.into()) {
        writeln!(
            out,
            "{}\t{}\t{}\t{} humans\t{} bots\t{} combat events",
            summary.file_id,
            summary.map_id,
            summary.day,
            summary.humans,
            summary.bots,
            summary.combat_events
        )
        .context("failed to write match list")?;
    }
    Ok(())
}

fn journeys(session: &mut Session, source: &mut FsMatchSource, args: &JourneysArgs) -> Result<()> {
    select_match(session, source, &args.match_id, args.at)?;

    let mut view = ViewState::default();
    let mut effects = Vec::new();
    for (toggle, hidden) in [
        (FilterToggle::Bots, args.no_bots),
        (FilterToggle::Paths, args.no_paths),
    ] {
        view = reduce(
            &view,
            ViewInput::SetFilter {
                toggle,
                visible: !hidden,
            },
            &mut effects,
        );
    }

    let mut list = Renderer::new().compose(&view, &RenderSources::from_session(session))?;
    if args.expand_markers {
        list = list.expand_markers();
    }
    present(&list, &mut JsonSurface::new(output(args.out.as_deref())?))
}

fn heatmap(session: &mut Session, source: &mut FsMatchSource, args: &HeatmapArgs) -> Result<()> {
    select_match(session, source, &args.match_id, args.at)?;
    let active = query::active_match(session).context("no match is active")?;
    let map = active.map().clone();
    let canvas = query::calibrations(session).calibration(&map)?.pixel_size();

    let mut effects = Vec::new();
    let mut view = ViewState::default();
    for input in [
        ViewInput::SetMode(ViewMode::Heatmap),
        ViewInput::SetHeatmapMode(args.mode),
        ViewInput::SetKernelRadius(args.radius),
        ViewInput::SetIntensity(args.intensity),
        ViewInput::SetAggregate(args.aggregate),
    ] {
        view = reduce(&view, input, &mut effects);
    }
    if effects.contains(&ViewEffect::RequestPooledEvents) {
        let scope = AggregationScope {
            map,
            day: args.day.clone().map(Day::new),
        };
        aggregate(session, source, AggregationKind::Pooled, scope)?;
    }

    let mask = args
        .mask
        .as_deref()
        .map(|path| export::load_mask(path, canvas))
        .transpose()?;
    let mut sources = RenderSources::from_session(session);
    if let Some(mask) = &mask {
        sources = sources.with_mask(mask);
    }
    let list = Renderer::new().compose(&view, &sources)?;

    let image = list
        .commands
        .into_iter()
        .find_map(|command| match command {
            DrawCommand::DensityImage { image, .. } => Some(image),
            _ => None,
        })
        .unwrap_or_else(|| HeatmapImage::empty(canvas, canvas));
    info!(
        mode = %args.mode,
        visible = image.visible_pixels(),
        path = %args.out.display(),
        "writing heatmap"
    );
    export::write_png(image, &args.out)
}

fn overlay(session: &mut Session, source: &mut FsMatchSource, args: &OverlayArgs) -> Result<()> {
    let scope = AggregationScope {
        map: MapId::new(args.map.as_str()),
        day: args.day.clone().map(Day::new),
    };
    aggregate(session, source, AggregationKind::Overlay, scope)?;
    let dataset = query::overlay(session).context("overlay aggregation produced no dataset")?;
    let summary = dataset.summary();
    println!(
        "{}: {} matches, {} humans, {} bots",
        dataset.map(),
        dataset.matches(),
        summary.humans,
        summary.bots
    );

    if let Some(path) = &args.out {
        let mut effects = Vec::new();
        let view = reduce(
            &ViewState::default(),
            ViewInput::SetFilter {
                toggle: FilterToggle::Bots,
                visible: !args.no_bots,
            },
            &mut effects,
        );
        let list = Renderer::new().compose(&view, &RenderSources::from_session(session))?;
        present(&list, &mut JsonSurface::new(output(Some(path))?))?;
    }
    Ok(())
}

fn timeline(session: &mut Session, source: &mut FsMatchSource, args: &TimelineArgs) -> Result<()> {
    select_match(session, source, &args.match_id, None)?;
    let mut events = Vec::new();
    apply(
        session,
        Command::SetPlaybackSpeed { speed: args.speed },
        &mut events,
    );
    apply(
        session,
        Command::TogglePlayback {
            now: Duration::ZERO,
        },
        &mut events,
    );
    let Some(handle) = events.iter().find_map(|event| match event {
        Event::PlaybackStarted { handle } => Some(*handle),
        _ => None,
    }) else {
        bail!("playback did not start");
    };

    let markers = match query::active_match(session) {
        Some(active) => query::timeline(session).markers(active.events()).len(),
        None => 0,
    };
    println!("{markers} combat markers");

    let step = Duration::from_millis(args.step_ms.max(1));
    let mut now = Duration::ZERO;
    let mut previous = query::cursor(session);
    loop {
        now += step;
        events.clear();
        apply(session, Command::Tick { handle, now }, &mut events);
        let timeline = query::timeline(session);
        let visible = query::active_match(session)
            .map(|active| timeline.cumulative_count(active.events()))
            .unwrap_or(0);
        println!(
            "{:>10.1}\t{:>3}%\t{visible} events",
            timeline.current(),
            timeline.progress_percent()
        );
        if events.contains(&Event::PlaybackFinished) || events.is_empty() {
            return Ok(());
        }
        if timeline.current() <= previous {
            warn!(cursor = timeline.current(), "playback cursor stopped advancing");
            return Ok(());
        }
        previous = timeline.current();
    }
}

fn parse_speed(raw: &str) -> Result<f64, String> {
    let speed: f64 = raw
        .parse()
        .map_err(|error| format!("invalid speed `{raw}`: {error}"))?;
    if !speed.is_finite() || speed < MIN_PLAYBACK_SPEED {
        return Err(format!(
            "speed must be a finite multiplier of at least {MIN_PLAYBACK_SPEED}"
        ));
    }
    Ok(speed)
}

fn select_match(
    session: &mut Session,
    source: &mut FsMatchSource,
    match_id: &str,
    at: Option<f64>,
) -> Result<()> {
    let (summary, telemetry) = source.load_match(query::index(session), &MatchId::new(match_id))?;
    let mut events = Vec::new();
    apply(
        session,
        Command::SelectMatch {
            summary,
            events: telemetry,
        },
        &mut events,
    );
    if let Some(time) = at {
        apply(session, Command::Seek { time }, &mut events);
    }
    log_events(&events);
    Ok(())
}

fn aggregate(
    session: &mut Session,
    source: &mut FsMatchSource,
    kind: AggregationKind,
    scope: AggregationScope,
) -> Result<()> {
    let mut events = Vec::new();
    apply(session, Command::BeginAggregation { kind, scope }, &mut events);
    loop {
        match poll_aggregation(session, kind, source, &mut events) {
            JobStatus::Idle => bail!("aggregation stopped before completing"),
            JobStatus::Loading { progress, .. } => {
                info!(
                    percent = progress.percent(),
                    completed = progress.completed,
                    total = progress.total,
                    "aggregating matches"
                );
            }
            JobStatus::Ready { generation, .. } => {
                apply(session, Command::CommitAggregation { generation }, &mut events);
                break;
            }
        }
    }
    log_events(&events);
    Ok(())
}

fn log_events(events: &[Event]) {
    for event in events {
        debug!(?event, "session event");
    }
}

fn output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create output file {}", path.display())
        })?)),
        None => Box::new(io::stdout().lock()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_must_reach_the_playback_minimum() {
        assert_eq!(parse_speed("2.5"), Ok(2.5));
        assert_eq!(parse_speed("0.01"), Ok(MIN_PLAYBACK_SPEED));
        assert!(parse_speed("1e-20").is_err());
        assert!(parse_speed("inf").is_err());
        assert!(parse_speed("fast").is_err());
    }
}
