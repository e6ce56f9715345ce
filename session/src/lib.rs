#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative viewing session for the match atlas.
//!
//! The session owns the match index, the active match, the timeline and the
//! aggregator. Hosts mutate it exclusively through [`apply`] and read it through
//! the [`query`] module; every derived dataset that referenced a replaced
//! match or map is invalidated as part of the same command.

use std::time::Duration;

use match_atlas_core::{
    CalibrationTable, MapId, MatchId, MatchSummary, TelemetryEvent,
};
use match_atlas_system_aggregation::{
    AggregationKind, AggregationScope, Aggregator, CommitOutcome, FetchTicket, Generation,
    JobStatus, MatchSource, OverlaySummary, Progress, SourceError,
};
use match_atlas_system_timeline::{TickOutcome, Timeline, TimerHandle};
use tracing::{debug, info};

/// Match currently bound to the session together with its telemetry.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveMatch {
    summary: MatchSummary,
    events: Vec<TelemetryEvent>,
}

impl ActiveMatch {
    /// Index record of the match.
    #[must_use]
    pub const fn summary(&self) -> &MatchSummary {
        &self.summary
    }

    /// Ordered telemetry of the match.
    #[must_use]
    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }

    /// Map the match was played on.
    #[must_use]
    pub const fn map(&self) -> &MapId {
        &self.summary.map_id
    }
}

/// Mutation requests accepted by [`apply`].
#[derive(Debug)]
pub enum Command {
    /// Replaces the match index.
    LoadIndex {
        /// New index records.
        matches: Vec<MatchSummary>,
    },
    /// Makes a match active, leaving overlay mode and resetting playback.
    SelectMatch {
        /// Index record of the match.
        summary: MatchSummary,
        /// Telemetry of the match.
        events: Vec<TelemetryEvent>,
    },
    /// Starts aggregating the indexed matches inside `scope`, superseding a
    /// running job of the same kind.
    BeginAggregation {
        /// Dataset shape to build.
        kind: AggregationKind,
        /// Matches to aggregate.
        scope: AggregationScope,
    },
    /// Merges the result of an externally driven fetch.
    CompleteFetch {
        /// Ticket obtained from [`next_fetch`].
        ticket: FetchTicket,
        /// Outcome of the fetch.
        result: Result<Vec<TelemetryEvent>, SourceError>,
    },
    /// Publishes a finished aggregation.
    CommitAggregation {
        /// Generation the job was started under.
        generation: Generation,
    },
    /// Abandons the running aggregation of one kind.
    CancelAggregation {
        /// Kind of the job to abandon.
        kind: AggregationKind,
    },
    /// Drops the overlay and returns to the active match.
    ClearOverlay,
    /// Moves the time cursor.
    Seek {
        /// Target time, clamped to the match bounds.
        time: f64,
    },
    /// Moves the time cursor to a slider step.
    SeekSlider {
        /// Step in `0..=1000`.
        position: u32,
    },
    /// Starts or stops playback.
    TogglePlayback {
        /// Host time of the request.
        now: Duration,
    },
    /// Stops playback.
    StopPlayback,
    /// Changes the playback speed multiplier.
    SetPlaybackSpeed {
        /// New multiplier.
        speed: f64,
    },
    /// Delivers a playback tick.
    Tick {
        /// Handle the tick was scheduled under.
        handle: TimerHandle,
        /// Host time of the tick.
        now: Duration,
    },
}

/// Notifications emitted by [`apply`] and [`poll_aggregation`].
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A match became active.
    MatchSelected {
        /// Identifier of the match.
        match_id: MatchId,
        /// Map of the match.
        map: MapId,
    },
    /// An aggregation job started.
    AggregationStarted {
        /// Generation of the job.
        generation: Generation,
        /// Dataset shape being built.
        kind: AggregationKind,
        /// Matches in scope.
        total: usize,
    },
    /// An aggregation job made progress.
    AggregationProgressed {
        /// Generation of the job.
        generation: Generation,
        /// Completion so far.
        progress: Progress,
    },
    /// Every match of a job resolved; the job awaits commit.
    AggregationReady {
        /// Generation of the job.
        generation: Generation,
    },
    /// A job's dataset was published.
    AggregationCommitted {
        /// Generation of the job.
        generation: Generation,
        /// Dataset shape that was published.
        kind: AggregationKind,
    },
    /// A commit was refused because its generation was superseded.
    AggregationDiscarded {
        /// Generation that was refused.
        generation: Generation,
    },
    /// A running job was cancelled or superseded.
    AggregationCancelled {
        /// Generation of the abandoned job.
        generation: Generation,
        /// Dataset shape the job was building.
        kind: AggregationKind,
    },
    /// Overlay mode became active.
    OverlayActivated {
        /// Unique entity counts of the overlay.
        summary: OverlaySummary,
    },
    /// Overlay mode ended.
    OverlayCleared,
    /// Pooled events of another map were dropped.
    PooledInvalidated,
    /// Playback started.
    PlaybackStarted {
        /// Handle ticks must be delivered with.
        handle: TimerHandle,
    },
    /// Playback stopped before reaching the end.
    PlaybackStopped,
    /// Playback reached the end of the match.
    PlaybackFinished,
    /// The time cursor moved.
    CursorMoved {
        /// New cursor time.
        time: f64,
    },
}

/// Authoritative state of one viewing session.
#[derive(Debug)]
pub struct Session {
    calibrations: CalibrationTable,
    index: Vec<MatchSummary>,
    active: Option<ActiveMatch>,
    timeline: Timeline,
    aggregator: Aggregator,
    overlay_mode: bool,
}

impl Session {
    /// Creates a session over the provided calibration table.
    #[must_use]
    pub fn new(calibrations: CalibrationTable) -> Self {
        Self {
            calibrations,
            index: Vec::new(),
            active: None,
            timeline: Timeline::new(),
            aggregator: Aggregator::new(),
            overlay_mode: false,
        }
    }

    fn leave_overlay(&mut self, out_events: &mut Vec<Event>) {
        let had_overlay = self.overlay_mode || self.aggregator.overlay().is_some();
        let cancelled = self.aggregator.clear_overlay();
        self.overlay_mode = false;
        if let Some(generation) = cancelled {
            out_events.push(Event::AggregationCancelled {
                generation,
                kind: AggregationKind::Overlay,
            });
        }
        if had_overlay {
            out_events.push(Event::OverlayCleared);
        }
    }

    fn stop_playback(&mut self, out_events: &mut Vec<Event>) {
        if self.timeline.stop() {
            out_events.push(Event::PlaybackStopped);
        }
    }
}

/// Applies the provided command to the session.
pub fn apply(session: &mut Session, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::LoadIndex { matches } => {
            info!(matches = matches.len(), "match index loaded");
            session.index = matches;
        }
        Command::SelectMatch { summary, events } => {
            session.leave_overlay(out_events);
            session.stop_playback(out_events);

            let pooled_elsewhere = session
                .aggregator
                .pooled()
                .map(|pooled| pooled.map() != &summary.map_id)
                .unwrap_or(false);
            let pooling_elsewhere = session
                .aggregator
                .running(AggregationKind::Pooled)
                .is_some_and(|scope| scope.map != summary.map_id);
            if pooled_elsewhere || pooling_elsewhere {
                if let Some(generation) = session.aggregator.invalidate_pooled() {
                    out_events.push(Event::AggregationCancelled {
                        generation,
                        kind: AggregationKind::Pooled,
                    });
                }
                out_events.push(Event::PooledInvalidated);
            }

            session.timeline.load(&events);
            info!(match_id = %summary.file_id, map = %summary.map_id, events = events.len(), "match selected");
            out_events.push(Event::MatchSelected {
                match_id: summary.file_id.clone(),
                map: summary.map_id.clone(),
            });
            session.active = Some(ActiveMatch { summary, events });
        }
        Command::BeginAggregation { kind, scope } => {
            if kind == AggregationKind::Overlay {
                session.overlay_mode = false;
            }
            if let Some(generation) = session.aggregator.cancel(kind) {
                out_events.push(Event::AggregationCancelled { generation, kind });
            }
            let generation = session.aggregator.begin(kind, scope, &session.index);
            let total = session
                .aggregator
                .progress(kind)
                .map(|progress| progress.total)
                .unwrap_or(0);
            out_events.push(Event::AggregationStarted {
                generation,
                kind,
                total,
            });
        }
        Command::CompleteFetch { ticket, result } => {
            let (generation, kind) = (ticket.generation(), ticket.kind());
            if session.aggregator.complete_fetch(ticket, result) {
                push_status(session.aggregator.status(kind), out_events);
            } else {
                debug!(%generation, "fetch result arrived after cancellation");
            }
        }
        Command::CommitAggregation { generation } => {
            match session.aggregator.commit(generation) {
                CommitOutcome::Committed(kind) => {
                    out_events.push(Event::AggregationCommitted { generation, kind });
                    if kind == AggregationKind::Overlay {
                        session.stop_playback(out_events);
                        session.overlay_mode = true;
                        let summary = session
                            .aggregator
                            .overlay()
                            .map(|overlay| overlay.summary())
                            .unwrap_or_default();
                        out_events.push(Event::OverlayActivated { summary });
                    }
                }
                CommitOutcome::Stale => {
                    out_events.push(Event::AggregationDiscarded { generation });
                }
                CommitOutcome::Incomplete => {
                    debug!(%generation, "commit requested before aggregation finished");
                }
            }
        }
        Command::CancelAggregation { kind } => {
            if let Some(generation) = session.aggregator.cancel(kind) {
                out_events.push(Event::AggregationCancelled { generation, kind });
            }
        }
        Command::ClearOverlay => session.leave_overlay(out_events),
        Command::Seek { time } => {
            session.timeline.seek(time);
            out_events.push(Event::CursorMoved {
                time: session.timeline.current(),
            });
        }
        Command::SeekSlider { position } => {
            session.timeline.seek_slider(position);
            out_events.push(Event::CursorMoved {
                time: session.timeline.current(),
            });
        }
        Command::TogglePlayback { now } => {
            if session.active.is_none() || session.overlay_mode {
                return;
            }
            match session.timeline.toggle(now) {
                Some(handle) => {
                    out_events.push(Event::PlaybackStarted { handle });
                    out_events.push(Event::CursorMoved {
                        time: session.timeline.current(),
                    });
                }
                None => out_events.push(Event::PlaybackStopped),
            }
        }
        Command::StopPlayback => session.stop_playback(out_events),
        Command::SetPlaybackSpeed { speed } => session.timeline.set_speed(speed),
        Command::Tick { handle, now } => match session.timeline.tick(handle, now) {
            TickOutcome::Ignored => {}
            TickOutcome::Advanced(time) => out_events.push(Event::CursorMoved { time }),
            TickOutcome::Finished => {
                out_events.push(Event::CursorMoved {
                    time: session.timeline.current(),
                });
                out_events.push(Event::PlaybackFinished);
            }
        },
    }
}

/// Issues the next fetch of any running aggregation for asynchronous hosts.
pub fn next_fetch(session: &mut Session) -> Option<FetchTicket> {
    session.aggregator.next_fetch()
}

/// Loads one batch of the running aggregation of `kind` from `source`.
///
/// Hosts should yield between calls while the returned status is loading.
pub fn poll_aggregation<S>(
    session: &mut Session,
    kind: AggregationKind,
    source: &mut S,
    out_events: &mut Vec<Event>,
) -> JobStatus
where
    S: MatchSource + ?Sized,
{
    let status = session.aggregator.poll(kind, source);
    push_status(status, out_events);
    status
}

fn push_status(status: JobStatus, out_events: &mut Vec<Event>) {
    match status {
        JobStatus::Idle => {}
        JobStatus::Loading {
            generation,
            progress,
        } => out_events.push(Event::AggregationProgressed {
            generation,
            progress,
        }),
        JobStatus::Ready {
            generation,
            progress,
        } => {
            out_events.push(Event::AggregationProgressed {
                generation,
                progress,
            });
            out_events.push(Event::AggregationReady { generation });
        }
    }
}

/// Query functions that provide read-only access to the session.
pub mod query {
    use match_atlas_core::{CalibrationTable, MatchSummary};
    use match_atlas_system_aggregation::{
        AggregationKind, OverlayDataset, PooledEvents, Progress,
    };
    use match_atlas_system_timeline::Timeline;

    use super::{ActiveMatch, Session};

    /// Calibration table the session renders with.
    #[must_use]
    pub fn calibrations(session: &Session) -> &CalibrationTable {
        &session.calibrations
    }

    /// Loaded match index.
    #[must_use]
    pub fn index(session: &Session) -> &[MatchSummary] {
        &session.index
    }

    /// Active match, if one is selected.
    #[must_use]
    pub fn active_match(session: &Session) -> Option<&ActiveMatch> {
        session.active.as_ref()
    }

    /// Timeline of the active match.
    #[must_use]
    pub fn timeline(session: &Session) -> &Timeline {
        &session.timeline
    }

    /// Current time cursor.
    #[must_use]
    pub fn cursor(session: &Session) -> f64 {
        session.timeline.current()
    }

    /// Overlay shown instead of the active match, when overlay mode is on.
    #[must_use]
    pub fn overlay(session: &Session) -> Option<&OverlayDataset> {
        if session.overlay_mode {
            session.aggregator.overlay()
        } else {
            None
        }
    }

    /// Pooled events matching the active match's map.
    #[must_use]
    pub fn pooled_for_active_map(session: &Session) -> Option<&PooledEvents> {
        let active = session.active.as_ref()?;
        session
            .aggregator
            .pooled()
            .filter(|pooled| pooled.map() == active.map())
    }

    /// Completion of the running aggregation of `kind`.
    #[must_use]
    pub fn aggregation_progress(session: &Session, kind: AggregationKind) -> Option<Progress> {
        session.aggregator.progress(kind)
    }

    /// Returns `true` while the overlay replaces the active match.
    #[must_use]
    pub fn is_overlay_mode(session: &Session) -> bool {
        session.overlay_mode
    }
}
